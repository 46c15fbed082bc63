//! Error type shared by the library operations

use std::path::Path;

/// Failures surfaced to the caller of a [`crate::library::Launcher`] operation
#[derive(Debug, Clone, PartialEq)]
pub enum LauncherError {
    /// The game directory does not exist
    NotFound { name: String, path: String },
    /// Install target already has a directory; delete it first
    AlreadyExists { name: String, path: String },
    /// Name cannot be used as a directory name
    InvalidName { name: String, reason: String },
    /// Update requested for a game that was not installed from a repository
    NotUpdatable { name: String },
    /// git / download / extraction failed
    ExternalTool { tool: String, reason: String },
    /// The game could not start because a known runtime is missing
    RuntimeDependency { message: String },
    /// Generic filesystem error with context
    Io { context: String, reason: String },
}

impl LauncherError {
    pub fn not_found(name: &str, path: &Path) -> Self {
        LauncherError::NotFound {
            name: name.to_string(),
            path: path.display().to_string(),
        }
    }

    pub fn already_exists(name: &str, path: &Path) -> Self {
        LauncherError::AlreadyExists {
            name: name.to_string(),
            path: path.display().to_string(),
        }
    }

    pub fn external(tool: &str, reason: impl std::fmt::Display) -> Self {
        LauncherError::ExternalTool {
            tool: tool.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LauncherError::Io {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable kind, used by the CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            LauncherError::NotFound { .. } => "not_found",
            LauncherError::AlreadyExists { .. } => "already_exists",
            LauncherError::InvalidName { .. } => "invalid_name",
            LauncherError::NotUpdatable { .. } => "not_updatable",
            LauncherError::ExternalTool { .. } => "external_tool",
            LauncherError::RuntimeDependency { .. } => "runtime_dependency",
            LauncherError::Io { .. } => "io",
        }
    }
}

impl std::fmt::Display for LauncherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LauncherError::NotFound { name, path } => {
                write!(f, "Game '{}' not found at {}", name, path)
            }
            LauncherError::AlreadyExists { name, path } => {
                write!(f, "Game '{}' is already installed at {}; delete it first", name, path)
            }
            LauncherError::InvalidName { name, reason } => {
                write!(f, "Invalid game name '{}': {}", name, reason)
            }
            LauncherError::NotUpdatable { name } => {
                write!(f, "Game '{}' was not installed from a repository and cannot be updated", name)
            }
            LauncherError::ExternalTool { tool, reason } => {
                write!(f, "{} failed: {}", tool, reason)
            }
            LauncherError::RuntimeDependency { message } => write!(f, "{}", message),
            LauncherError::Io { context, reason } => {
                write!(f, "{}: {}", context, reason)
            }
        }
    }
}

impl std::error::Error for LauncherError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_plain_sentences() {
        let err = LauncherError::not_found("Bar", Path::new("/games/Bar"));
        assert_eq!(err.to_string(), "Game 'Bar' not found at /games/Bar");
        assert_eq!(err.kind(), "not_found");

        let err = LauncherError::external("git clone", "authentication required");
        assert_eq!(err.to_string(), "git clone failed: authentication required");

        let err = LauncherError::RuntimeDependency { message: "Install Java".to_string() };
        assert_eq!(err.to_string(), "Install Java");
    }
}
