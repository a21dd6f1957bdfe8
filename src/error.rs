//! Harness error taxonomy
//!
//! Every infrastructure failure of a run surfaces as a [`HarnessError`]. A failing embedded suite is *not* an
//! error: it comes back as a non-zero [`crate::exit::ResultCode`].

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Errors that end a harness run before the suite could report a status
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("missing build artifact: {}", path.display())]
    #[diagnostic(
        code(harness::missing_artifact),
        help("the build directory must contain the compiled module and its loader script")
    )]
    MissingArtifact { path: PathBuf },

    #[error("failed to start static file server on 127.0.0.1:{port}")]
    #[diagnostic(code(harness::server_start))]
    ServerStart {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("no browser executable found")]
    #[diagnostic(
        code(harness::browser_not_found),
        help("install Chromium or Chrome, or pass --browser / set WASM_HARNESS_BROWSER")
    )]
    BrowserNotFound,

    #[error("browser launch failed: {0}")]
    #[diagnostic(code(harness::browser_launch))]
    BrowserLaunch(String),

    #[error("navigation to {url} failed: {reason}")]
    #[diagnostic(code(harness::navigation))]
    Navigation { url: String, reason: String },

    #[error("in-page evaluation failed: {0}")]
    #[diagnostic(code(harness::evaluation))]
    Evaluation(String),

    #[error("in-page evaluation returned a non-integer status: {0}")]
    #[diagnostic(
        code(harness::invalid_result),
        help("the module's run_tests() must return an integer")
    )]
    InvalidResult(String),

    #[error("timed out after {after:?} waiting for {what}")]
    #[diagnostic(code(harness::timeout))]
    Timeout { what: &'static str, after: Duration },

    #[error("devtools protocol error: {0}")]
    #[diagnostic(code(harness::protocol))]
    Protocol(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(harness::io))]
    Io(#[from] std::io::Error),
}

/// Coarse failure classes a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A required build file is absent; raised before any port or server exists
    MissingArtifact,
    /// The loopback listener could not be bound
    ServerStartFailure,
    /// The browser crashed, timed out, failed to load the page, or the script threw
    NavigationOrEvaluationFailure,
    /// Local environment problems (I/O, no browser installed)
    Environment,
}

impl HarnessError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HarnessError::MissingArtifact { .. } => ErrorCategory::MissingArtifact,
            HarnessError::ServerStart { .. } => ErrorCategory::ServerStartFailure,
            HarnessError::BrowserLaunch(_)
            | HarnessError::Navigation { .. }
            | HarnessError::Evaluation(_)
            | HarnessError::InvalidResult(_)
            | HarnessError::Timeout { .. }
            | HarnessError::Protocol(_) => ErrorCategory::NavigationOrEvaluationFailure,
            HarnessError::BrowserNotFound | HarnessError::Io(_) => ErrorCategory::Environment,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_message_names_path() {
        let err = HarnessError::MissingArtifact {
            path: PathBuf::from("build/test_xsimd.wasm"),
        };
        assert_eq!(err.to_string(), "missing build artifact: build/test_xsimd.wasm");
        assert_eq!(err.category(), ErrorCategory::MissingArtifact);
    }

    #[test]
    fn test_browser_failures_share_a_category() {
        let errors = [
            HarnessError::Evaluation("ReferenceError".into()),
            HarnessError::Navigation {
                url: "http://127.0.0.1:1/".into(),
                reason: "net::ERR_CONNECTION_REFUSED".into(),
            },
            HarnessError::Timeout {
                what: "page load",
                after: Duration::from_secs(1),
            },
        ];
        for err in errors {
            assert_eq!(err.category(), ErrorCategory::NavigationOrEvaluationFailure);
        }
    }

    #[test]
    fn test_server_start_keeps_source() {
        use std::error::Error as _;

        let err = HarnessError::ServerStart {
            port: 8080,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.category(), ErrorCategory::ServerStartFailure);
        assert!(err.source().is_some());
    }
}
