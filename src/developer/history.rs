//! Conversation history for the developer agent
//!
//! The history is an append-only log whose first element is the System
//! message. Steps never mutate it directly; they return the messages to
//! append and the controller applies them.

use crate::llm::{AgentReply, Message};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Start a history with the given System message
    pub fn new(system: Message) -> Self {
        Self {
            messages: vec![system],
        }
    }

    /// Rebuild from stored messages
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The System message, if it sits at index 0
    pub fn system(&self) -> Option<&Message> {
        self.messages
            .first()
            .filter(|m| matches!(m, Message::System { .. }))
    }

    /// Append a step's delta
    pub fn append(&mut self, delta: Vec<Message>) {
        self.messages.extend(delta);
    }

    /// Swap in a new message list, returning the old one
    pub fn replace(&mut self, messages: Vec<Message>) -> Vec<Message> {
        std::mem::replace(&mut self.messages, messages)
    }

    /// Replies from the agent, oldest first
    pub fn agent_replies(&self) -> impl DoubleEndedIterator<Item = &AgentReply> {
        self.messages.iter().filter_map(Message::reply)
    }

    /// Tool request ids with no tool result after them
    pub fn unanswered_requests(&self) -> Vec<String> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::Tool { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();

        self.agent_replies()
            .flat_map(|reply| {
                reply
                    .tool_requests()
                    .iter()
                    .map(|c| c.id.as_str())
                    .chain(reply.invalid_requests().iter().map(|c| c.id.as_str()))
            })
            .filter(|id| !answered.contains(id))
            .map(str::to_string)
            .collect()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use serde_json::json;

    fn tool_reply(id: &str) -> Message {
        Message::assistant(AgentReply::ToolRequests {
            content: String::new(),
            requests: vec![ToolCall {
                id: id.to_string(),
                name: "list_files".to_string(),
                arguments: json!({}),
            }],
        })
    }

    #[test]
    fn test_system_is_first() {
        let history = ConversationHistory::new(Message::system("sys"));
        assert!(history.system().is_some());
        assert_eq!(history.len(), 1);

        let no_system = ConversationHistory::from_messages(vec![Message::user("hi")]);
        assert!(no_system.system().is_none());
    }

    #[test]
    fn test_append_and_replace() {
        let mut history = ConversationHistory::new(Message::system("sys"));
        history.append(vec![Message::user("task"), Message::assistant(AgentReply::plain("ok"))]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().unwrap().content(), "ok");

        let old = history.replace(vec![Message::system("fresh")]);
        assert_eq!(old.len(), 3);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_unanswered_requests() {
        let mut history = ConversationHistory::new(Message::system("sys"));
        history.append(vec![tool_reply("c1")]);
        assert_eq!(history.unanswered_requests(), vec!["c1".to_string()]);

        history.append(vec![Message::tool_result("c1", "list_files", "[FILE] a.html")]);
        assert!(history.unanswered_requests().is_empty());
    }
}
