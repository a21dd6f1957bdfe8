//! Result to exit-code translation
//!
//! The suite's status is opaque to the harness: `0` means passed, anything else is a failure in the suite's own
//! convention and is handed to the caller unchanged. Statuses that do not fit a process exit status are clamped
//! to [`MAX_EXIT_STATUS`] so that 8-bit truncation can never turn a failure into `0`.

use std::fmt;

/// Largest status a process can portably exit with.
pub const MAX_EXIT_STATUS: i32 = 255;

/// Status returned by the embedded suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub i64);

impl ResultCode {
    pub const PASSED: ResultCode = ResultCode(0);

    pub fn passed(self) -> bool {
        self.0 == 0
    }

    /// Whether the status survives as a process exit status without clamping.
    pub fn is_representable(self) -> bool {
        (0..=i64::from(MAX_EXIT_STATUS)).contains(&self.0)
    }

    /// Process exit status for this result.
    pub fn exit_status(self) -> i32 {
        if self.is_representable() {
            // In range by the check above
            self.0 as i32
        } else {
            tracing::warn!(
                status = self.0,
                clamped = MAX_EXIT_STATUS,
                "suite status does not fit a process exit status"
            );
            MAX_EXIT_STATUS
        }
    }
}

impl From<i64> for ResultCode {
    fn from(value: i64) -> Self {
        ResultCode(value)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
