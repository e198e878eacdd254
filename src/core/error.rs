//! Error types for pkgcenter with helpful suggestions

use thiserror::Error;

/// Convenience Result type for pkgcenter operations
pub type Result<T> = std::result::Result<T, PkgCenterError>;

#[derive(Error, Debug)]
pub enum PkgCenterError {
    /// The backend rejected or failed a request
    #[error("Backend error ({code}): {message}")]
    Backend { code: String, message: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Package not installed: {0}")]
    NotInstalled(String),

    #[error("Another operation is already running for {0}")]
    OperationInProgress(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl PkgCenterError {
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get a helpful suggestion for how to fix this error
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::PackageNotFound(_) => Some(
                "The package may not be available for this system. Try refreshing the package cache",
            ),
            Self::NotInstalled(_) => Some("Refresh the installed package list and try again"),
            Self::OperationInProgress(_) => {
                Some("Wait for the running operation to finish, or cancel it first")
            }
            Self::Backend { .. } => {
                Some("Check the package service logs for details about the failed transaction")
            }
            Self::WatchError(_) => Some("Check inotify watch limits (fs.inotify.max_user_watches)"),
            Self::Cancelled | Self::IoError(_) => None,
        }
    }
}

/// Format an error with its suggestion for display
pub fn format_error_with_suggestion(err: &PkgCenterError) -> String {
    let mut msg = format!("Error: {err}");
    if let Some(suggestion) = err.suggestion() {
        msg.push_str("\n\n");
        msg.push_str(suggestion);
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = PkgCenterError::backend("no-network", "Cannot reach mirror");
        assert_eq!(err.to_string(), "Backend error (no-network): Cannot reach mirror");
    }

    #[test]
    fn test_format_with_suggestion() {
        let msg = format_error_with_suggestion(&PkgCenterError::PackageNotFound("foo".into()));
        assert!(msg.starts_with("Error: Package not found: foo"));
        assert!(msg.contains("refreshing the package cache"));
    }

    #[test]
    fn test_cancelled_has_no_suggestion() {
        assert!(PkgCenterError::Cancelled.suggestion().is_none());
        assert!(PkgCenterError::Cancelled.is_cancelled());
    }
}
