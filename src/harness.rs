//! Run lifecycle
//!
//! One run, in order:
//!
//! 1. stage the artifacts (fails with `MissingArtifact` before any port is allocated)
//! 2. allocate a loopback port and start the static server on it, rooted at the staging area
//! 3. hand the host page URL to a [`PageRunner`] and await the suite's status
//! 4. stop the server and join its thread
//! 5. delete the staging area
//!
//! Steps 4 and 5 happen whether step 3 succeeded or not. The server is always stopped before the staging area
//! is deleted. Only one run may be in flight per process.

use std::future::Future;

use crate::browser::BrowserDriver;
use crate::config::RunConfig;
use crate::error::HarnessResult;
use crate::exit::ResultCode;
use crate::port::allocate_port;
use crate::server::StaticServer;
use crate::staging::StagingArea;

/// Loads a served host page and returns the embedded suite's status.
///
/// The browser-backed implementation is [`BrowserDriver`]; the trait exists so the lifecycle can be driven by
/// other runners (tests, dry runs).
pub trait PageRunner {
    fn run_page(&self, page_url: &str) -> impl Future<Output = HarnessResult<i64>>;
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub code: ResultCode,
    /// Port the static server was bound to (released by now)
    pub port: u16,
    pub page_url: String,
}

/// Run the suite in a real browser.
pub async fn run(config: &RunConfig) -> HarnessResult<RunOutcome> {
    run_with(config, &BrowserDriver::from_config(config)).await
}

/// Run the full lifecycle with `runner` loading the page.
#[tracing::instrument(skip_all, fields(build_dir = %config.build_dir.display()))]
pub async fn run_with<R: PageRunner>(config: &RunConfig, runner: &R) -> HarnessResult<RunOutcome> {
    let staging = StagingArea::stage(config)?;
    let port = allocate_port()?;
    let mut server = StaticServer::start(staging.path(), port)?;
    let page_url = server.url_for(staging.page_name());

    tracing::info!(%page_url, "running suite");
    let status = runner.run_page(&page_url).await;

    server.stop();
    drop(server);
    let cleanup = staging.close();

    // A runner failure is reported ahead of a cleanup failure
    let code = ResultCode::from(status?);
    cleanup?;

    if code.passed() {
        tracing::info!("suite passed");
    } else {
        tracing::info!(%code, "suite failed");
    }

    Ok(RunOutcome { code, port, page_url })
}
