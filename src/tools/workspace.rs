//! Sandboxed project workspace
//!
//! Every file tool resolves its `path` argument through [`Workspace::resolve`],
//! which keeps all reads and writes inside the project root.

use crate::tools::ToolError;
use std::path::{Component, Path, PathBuf};

/// Root directory that file tools are confined to
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create the workspace directory if needed and pin its canonical root
    pub async fn create<P: AsRef<Path>>(root: P) -> Result<Self, ToolError> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            ToolError::InitializationError(format!(
                "Cannot create workspace {}: {e}",
                root.display()
            ))
        })?;
        let root = tokio::fs::canonicalize(root).await.map_err(|e| {
            ToolError::InitializationError(format!(
                "Cannot resolve workspace {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path to an absolute path inside the workspace.
    ///
    /// Relative paths are joined onto the root. Absolute paths are accepted
    /// only when they already point inside the root. `..` segments are applied
    /// lexically and may never climb above the root.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ToolError> {
        let requested_path = Path::new(requested);
        let relative = if requested_path.is_absolute() {
            let normalized = normalize_absolute(requested_path);
            normalized
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .map_err(|_| Self::escape_error(requested))?
        } else {
            requested_path.to_path_buf()
        };

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(segment) => {
                    resolved.push(segment);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(Self::escape_error(requested));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Self::escape_error(requested));
                }
            }
        }

        Ok(resolved)
    }

    /// Path relative to the root, for tool output
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| {
                let shown = p.display().to_string();
                if shown.is_empty() {
                    ".".to_string()
                } else {
                    shown
                }
            })
            .unwrap_or_else(|_| path.display().to_string())
    }

    fn escape_error(requested: &str) -> ToolError {
        ToolError::ExecutionError(format!(
            "Access denied: '{requested}' is outside the project workspace"
        ))
    }
}

/// Lexically normalize an absolute path (pure function)
fn normalize_absolute(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
