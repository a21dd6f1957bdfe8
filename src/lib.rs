#![forbid(unsafe_code)]
//! Browser harness for WebAssembly test suites
//!
//! Runs a compiled WASM test suite inside a real browser engine and turns the
//! suite's integer status into the process exit code. The lifecycle of one run:
//!
//! 1. stage the module, its loader and the host page into a fresh directory
//! 2. pick a free loopback port and serve the staged directory on it
//! 3. launch a browser, load the host page, evaluate the in-page protocol
//! 4. tear down the browser, the server and the staged directory
//! 5. exit with the status the suite returned
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod exit;
pub mod harness;
pub mod port;
pub mod protocol;
pub mod server;
pub mod staging;
pub mod version;

pub use browser::BrowserDriver;
pub use config::{ArtifactLayout, HostPage, RunConfig};
pub use error::{ErrorCategory, HarnessError, HarnessResult};
pub use exit::ResultCode;
pub use harness::{PageRunner, RunOutcome, run_with};
