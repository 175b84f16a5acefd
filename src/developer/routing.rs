//! Completion decision
//!
//! Pure function from the latest history entry to the next controller step.

use crate::llm::{AgentReply, Message};
use crate::tools::NEXT_TASK_TOOL;
use serde::{Deserialize, Serialize};

/// Where the controller goes after an agent turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Prompt the agent again
    Continue,
    /// Run the requested tools, then return to the agent
    DispatchTools,
    /// The agent signalled that the current task is done
    Advance,
}

/// Decide the next step from the last message in the history.
///
/// Anything that is not an agent reply with well-formed tool requests
/// continues the loop; ambiguous input never ends a task.
pub fn route(last: Option<&Message>) -> Route {
    match last.and_then(Message::reply) {
        Some(reply) => route_reply(reply),
        None => Route::Continue,
    }
}

/// Routing over a classified reply (pure function)
pub fn route_reply(reply: &AgentReply) -> Route {
    match reply {
        AgentReply::ToolRequests { requests, .. } => {
            if requests.iter().any(|call| call.name == NEXT_TASK_TOOL) {
                Route::Advance
            } else if requests.is_empty() {
                Route::Continue
            } else {
                Route::DispatchTools
            }
        }
        AgentReply::PlainContent { .. } | AgentReply::InvalidToolRequests { .. } => Route::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{InvalidToolCall, ToolCall};
    use proptest::prelude::*;
    use serde_json::json;

    fn requests(names: &[&str]) -> Message {
        Message::assistant(AgentReply::ToolRequests {
            content: String::new(),
            requests: names
                .iter()
                .enumerate()
                .map(|(i, name)| ToolCall {
                    id: format!("call_{i}"),
                    name: name.to_string(),
                    arguments: json!({}),
                })
                .collect(),
        })
    }

    #[test]
    fn test_next_task_routes_to_advance() {
        assert_eq!(route(Some(&requests(&["next_task"]))), Route::Advance);
        assert_eq!(
            route(Some(&requests(&["write_file", "next_task"]))),
            Route::Advance
        );
    }

    #[test]
    fn test_other_tools_route_to_dispatch() {
        assert_eq!(
            route(Some(&requests(&["write_file", "read_file"]))),
            Route::DispatchTools
        );
    }

    #[test]
    fn test_plain_content_continues() {
        let message = Message::assistant(AgentReply::plain("Let me think."));
        assert_eq!(route(Some(&message)), Route::Continue);
    }

    #[test]
    fn test_empty_request_list_continues() {
        assert_eq!(route(Some(&requests(&[]))), Route::Continue);
    }

    #[test]
    fn test_invalid_requests_continue() {
        let message = Message::assistant(AgentReply::InvalidToolRequests {
            content: String::new(),
            invalid: vec![InvalidToolCall {
                id: "c1".to_string(),
                name: "next_task".to_string(),
                raw_arguments: "{".to_string(),
                error: "EOF".to_string(),
            }],
        });
        assert_eq!(route(Some(&message)), Route::Continue);
    }

    #[test]
    fn test_non_agent_messages_continue() {
        assert_eq!(route(None), Route::Continue);
        assert_eq!(route(Some(&Message::user("go"))), Route::Continue);
        assert_eq!(
            route(Some(&Message::tool_result("c1", "write_file", "ok"))),
            Route::Continue
        );
    }

    proptest! {
        #[test]
        fn prop_routing_is_stable(names in proptest::collection::vec(
            prop_oneof![
                Just("write_file"),
                Just("edit_file"),
                Just("read_file"),
                Just("list_files"),
                Just("next_task"),
            ],
            0..6,
        )) {
            let message = requests(&names);
            let first = route(Some(&message));
            prop_assert_eq!(first, route(Some(&message.clone())));

            let expected = if names.contains(&"next_task") {
                Route::Advance
            } else if names.is_empty() {
                Route::Continue
            } else {
                Route::DispatchTools
            };
            prop_assert_eq!(first, expected);
        }
    }
}
