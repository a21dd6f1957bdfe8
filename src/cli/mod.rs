//! CLI module for the harness
//!
//! ## Usage
//!
//! `wasm-browser-harness <BUILD_DIR> [--headed] [--slow-mo <MS>] [--browser <PATH>] ...`
//!
//! The process exits with the embedded suite's status: `0` when it passed, the suite's own non-zero code when
//! it failed. Harness failures (missing artifacts, no browser, page errors, timeouts) print a diagnostic and
//! exit with [`ExitCode::HARNESS_FAILURE`].
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use crate::config::{BROWSER_ENV_VAR, HostPage, RunConfig};
use crate::error::HarnessError;
use crate::exit::ResultCode;
use crate::harness;
use crate::version::HARNESS_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// Infrastructure failure: the suite never reported a status.
    pub const HARNESS_FAILURE: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a harness failure error.
    pub fn harness(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::HARNESS_FAILURE)
    }
}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        // Debug formatting of a Report renders the full diagnostic (code, causes, help)
        let report = miette::Report::new(err);
        Self::harness(format!("{report:?}"))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run a compiled WebAssembly test suite in a browser
#[derive(Parser, Debug)]
#[command(name = "wasm-browser-harness")]
#[command(version = HARNESS_VERSION)]
#[command(about = "Run a compiled WebAssembly test suite in a browser", long_about = None)]
pub struct Cli {
    /// Build output directory containing the compiled module and its loader
    #[arg(value_name = "BUILD_DIR")]
    pub build_dir: PathBuf,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Delay every browser automation step by this many milliseconds
    #[arg(long = "slow-mo", value_name = "MS")]
    pub slow_mo: Option<u64>,

    /// Ceiling for the in-page evaluation, in seconds
    #[arg(long = "eval-timeout", value_name = "SECS", default_value_t = 240)]
    pub eval_timeout: u64,

    /// Browser executable (Chromium or Chrome)
    #[arg(long, value_name = "PATH", env = BROWSER_ENV_VAR)]
    pub browser: Option<PathBuf>,

    /// Keep the browser's process sandbox enabled
    #[arg(long)]
    pub sandbox: bool,

    /// Directory to create the serving root in (default: the system temp dir)
    #[arg(long = "work-root", value_name = "DIR")]
    pub work_root: Option<PathBuf>,

    /// Host page template to stage instead of the built-in one
    #[arg(long = "host-page", value_name = "FILE")]
    pub host_page: Option<PathBuf>,
}

impl Cli {
    /// Build the run configuration from parsed arguments.
    pub fn to_config(&self) -> RunConfig {
        let host_page = self
            .host_page
            .clone()
            .map(HostPage::File)
            .unwrap_or_default();
        RunConfig::new(&self.build_dir)
            .with_headless(!self.headed)
            .with_slow_motion(self.slow_mo.map(Duration::from_millis))
            .with_eval_timeout(Duration::from_secs(self.eval_timeout))
            .with_browser(self.browser.clone())
            .with_browser_sandbox(self.sandbox)
            .with_work_root(self.work_root.clone())
            .with_host_page(host_page)
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => process::exit(exit_code.0),
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute one harness run and return the exit code to terminate with.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = cli.to_config();
    tracing::info!(build_dir = %config.build_dir.display(), headless = config.headless, "starting harness");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::harness(format!("failed to start async runtime: {e}")))?;

    let outcome = runtime.block_on(harness::run(&config))?;
    Ok(exit_code_for(outcome.code))
}

/// Process exit code for the suite's result.
fn exit_code_for(code: ResultCode) -> ExitCode {
    if code.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode(code.exit_status())
    }
}

// ============================================================================
// Tests
// ============================================================================
