//! Browser driver
//!
//! Runs the in-page protocol against a host page in a freshly launched browser, driven by chromiumoxide:
//!
//! 1. launch the browser with a throwaway profile and spawn the protocol handler task
//! 2. open one blank page and start relaying its console to stdout (`console`)
//! 3. navigate to the host page and wait for the navigation to finish
//! 4. evaluate the protocol script and decode the status
//! 5. close the browser, killing it if it does not exit in time
//!
//! Steps 3 and 4 go through [`ScriptPage`], so the timing and decoding rules can be exercised without a browser.
//! A browser instance is never reused across runs.

pub mod console;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, EventConsoleApiCalled, RemoteObject};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::RunConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::harness::PageRunner;
use crate::protocol::{self, ProtocolScript};

/// How long the browser gets to exit after closing before it is killed.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Added to the longest step ceiling so the crate's own request timeout never fires first.
const REQUEST_SLACK: Duration = Duration::from_secs(5);

const PROFILE_PREFIX: &str = "wasm-harness-profile-";

/// Settings for one browser run, taken from the [`RunConfig`].
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub slow_motion: Option<Duration>,
    pub launch_timeout: Duration,
    pub navigation_timeout: Duration,
    pub eval_timeout: Duration,
}

impl BrowserOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            executable: config.browser.clone(),
            headless: config.headless,
            sandbox: config.browser_sandbox,
            slow_motion: config.slow_motion,
            launch_timeout: config.launch_timeout,
            navigation_timeout: config.navigation_timeout,
            eval_timeout: config.eval_timeout,
        }
    }

    /// Browser launch configuration using `profile` as the user data directory.
    fn browser_config(&self, profile: &Path) -> HarnessResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile)
            .launch_timeout(self.launch_timeout)
            .request_timeout(self.eval_timeout.max(self.navigation_timeout) + REQUEST_SLACK);
        if !self.headless {
            builder = builder.with_head();
        }
        if !self.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        builder.build().map_err(|reason| match self.executable {
            // Without an explicit path the only failure is auto-detection
            None => {
                tracing::debug!(%reason, "browser auto-detection failed");
                HarnessError::BrowserNotFound
            }
            Some(_) => HarnessError::BrowserLaunch(reason),
        })
    }

    /// Sleep for the slow-motion delay, if any.
    async fn pace(&self) {
        if let Some(delay) = self.slow_motion {
            tokio::time::sleep(delay).await;
        }
    }
}

/// A loaded page the protocol script can be run in.
pub trait ScriptPage {
    /// Navigate to `url` and wait for the navigation to finish.
    fn load(&self, url: &str) -> impl Future<Output = HarnessResult<()>>;

    /// Evaluate `expression`, awaiting a returned promise, and hand back its value.
    fn run_script(&self, expression: &str) -> impl Future<Output = HarnessResult<Value>>;
}

impl ScriptPage for Page {
    async fn load(&self, url: &str) -> HarnessResult<()> {
        self.goto(url).await.map_err(|e| HarnessError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn run_script(&self, expression: &str) -> HarnessResult<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(HarnessError::Protocol)?;
        let result = self
            .evaluate_expression(params)
            .await
            .map_err(|e| HarnessError::Evaluation(e.to_string()))?;
        Ok(remote_value(result.object()))
    }
}

/// The value of an evaluation result as JSON. BigInts (`7n`) become their digits as a string; `undefined`
/// becomes `null`.
fn remote_value(object: &RemoteObject) -> Value {
    match (&object.value, &object.unserializable_value) {
        (Some(value), _) => value.clone(),
        (None, Some(raw)) => {
            let raw = raw.inner();
            Value::String(raw.strip_suffix('n').unwrap_or(raw).to_string())
        }
        (None, None) => Value::Null,
    }
}

/// Load `url` in `page`, run `script` and decode the status it returns.
pub async fn drive_page<P: ScriptPage>(
    page: &P,
    url: &str,
    script: &ProtocolScript,
    options: &BrowserOptions,
) -> HarnessResult<i64> {
    options.pace().await;
    tokio::time::timeout(options.navigation_timeout, page.load(url))
        .await
        .map_err(|_| HarnessError::Timeout {
            what: "page load",
            after: options.navigation_timeout,
        })??;
    tracing::info!(url, "host page loaded");

    options.pace().await;
    let value = tokio::time::timeout(options.eval_timeout, page.run_script(&script.expression()))
        .await
        .map_err(|_| HarnessError::Timeout {
            what: "in-page evaluation",
            after: options.eval_timeout,
        })??;

    let status = protocol::decode_status(&value)?;
    tracing::info!(status, "suite returned");
    Ok(status)
}

/// [`PageRunner`] backed by a real browser.
#[derive(Debug, Clone)]
pub struct BrowserDriver {
    options: BrowserOptions,
    script: ProtocolScript,
}

impl BrowserDriver {
    pub fn new(options: BrowserOptions, script: ProtocolScript) -> Self {
        Self { options, script }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(BrowserOptions::from_config(config), ProtocolScript::new(&config.layout))
    }

    async fn launch(&self, profile: &Path) -> HarnessResult<(Browser, JoinHandle<()>)> {
        let config = self.options.browser_config(profile)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarnessError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "devtools handler stopped");
                    break;
                }
            }
        });
        tracing::info!(headless = self.options.headless, "browser launched");
        Ok((browser, handler))
    }

    /// Open a blank page with its console relayed to stdout.
    async fn open_page(&self, browser: &Browser) -> HarnessResult<(Page, JoinHandle<()>)> {
        self.options.pace().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarnessError::Protocol(format!("cannot open page: {e}")))?;
        let events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(|e| HarnessError::Protocol(format!("cannot subscribe to console: {e}")))?;
        let relay = console::spawn_relay(
            events.map(|event| console::console_text(&event.args)),
            std::io::stdout(),
        );
        Ok((page, relay))
    }

    async fn run_in(&self, browser: &Browser, page_url: &str) -> (HarnessResult<i64>, Option<JoinHandle<()>>) {
        match self.open_page(browser).await {
            Ok((page, relay)) => (drive_page(&page, page_url, &self.script, &self.options).await, Some(relay)),
            Err(e) => (Err(e), None),
        }
    }
}

impl PageRunner for BrowserDriver {
    async fn run_page(&self, page_url: &str) -> HarnessResult<i64> {
        let profile = tempfile::Builder::new().prefix(PROFILE_PREFIX).tempdir()?;
        let (browser, handler) = self.launch(profile.path()).await?;
        let (result, relay) = self.run_in(&browser, page_url).await;
        self.options.pace().await;
        close(browser, handler, relay).await;
        result
    }
}

/// Close the browser and wait for the handler and console relay to finish.
async fn close(mut browser: Browser, handler: JoinHandle<()>, relay: Option<JoinHandle<()>>) {
    if let Err(e) = browser.close().await {
        // The browser may drop the connection before replying
        tracing::debug!(error = %e, "closing browser");
    }
    match tokio::time::timeout(CLOSE_GRACE, browser.wait()).await {
        Ok(Ok(_)) => tracing::debug!("browser exited"),
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to wait for browser"),
        Err(_) => {
            tracing::warn!(grace = ?CLOSE_GRACE, "browser did not exit, killing it");
            if let Some(Err(e)) = browser.kill().await {
                tracing::warn!(error = %e, "failed to kill browser");
            }
        }
    }
    drop(browser);

    // The relay ends once the handler has dropped its event senders
    for (task, name) in [(Some(handler), "devtools handler"), (relay, "console relay")] {
        let Some(mut task) = task else { continue };
        if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
            tracing::warn!(task = name, "did not finish in time");
            task.abort();
        }
    }
    tracing::info!("browser closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactLayout;
    use serde_json::json;
    use std::cell::RefCell;
    use std::time::Instant;

    /// How a fake page responds to one step.
    #[derive(Clone)]
    enum Step {
        Done(Value),
        Fail,
        Hang,
    }

    struct FakePage {
        load: Step,
        script: Step,
        calls: RefCell<Vec<String>>,
    }

    impl FakePage {
        fn returning(value: Value) -> Self {
            Self {
                load: Step::Done(Value::Null),
                script: Step::Done(value),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    async fn respond(step: &Step, error: HarnessError) -> HarnessResult<Value> {
        match step {
            Step::Done(value) => Ok(value.clone()),
            Step::Fail => Err(error),
            Step::Hang => std::future::pending().await,
        }
    }

    impl ScriptPage for FakePage {
        async fn load(&self, url: &str) -> HarnessResult<()> {
            self.calls.borrow_mut().push(format!("load {url}"));
            let error = HarnessError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            };
            respond(&self.load, error).await.map(|_| ())
        }

        async fn run_script(&self, expression: &str) -> HarnessResult<Value> {
            self.calls.borrow_mut().push(format!("run {expression}"));
            let error = HarnessError::Evaluation("ReferenceError: test_xsimd_wasm is not defined".to_string());
            respond(&self.script, error).await
        }
    }

    fn options() -> BrowserOptions {
        BrowserOptions::from_config(&RunConfig::new("build"))
    }

    fn script() -> ProtocolScript {
        ProtocolScript::new(&ArtifactLayout::default())
    }

    const URL: &str = "http://127.0.0.1:8000/browser_main.html";

    #[tokio::test]
    async fn test_loads_then_runs_protocol_script() {
        let page = FakePage::returning(json!(0));

        let status = drive_page(&page, URL, &script(), &options()).await.unwrap();

        assert_eq!(status, 0);
        let calls = page.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], format!("load {URL}"));
        assert_eq!(calls[1], format!("run {}", script().expression()));
    }

    #[tokio::test]
    async fn test_failing_status_is_returned() {
        let page = FakePage::returning(json!(1));
        assert_eq!(drive_page(&page, URL, &script(), &options()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_skips_evaluation() {
        let page = FakePage {
            load: Step::Fail,
            ..FakePage::returning(json!(0))
        };

        let err = drive_page(&page, URL, &script(), &options()).await.unwrap_err();

        assert!(matches!(err, HarnessError::Navigation { ref reason, .. } if reason.contains("REFUSED")));
        assert_eq!(page.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_script_exception_is_evaluation_failure() {
        let page = FakePage {
            script: Step::Fail,
            ..FakePage::returning(json!(0))
        };

        let err = drive_page(&page, URL, &script(), &options()).await.unwrap_err();
        assert!(matches!(err, HarnessError::Evaluation(ref msg) if msg.contains("test_xsimd_wasm")));
    }

    #[tokio::test]
    async fn test_page_load_times_out() {
        let page = FakePage {
            load: Step::Hang,
            ..FakePage::returning(json!(0))
        };
        let options = BrowserOptions {
            navigation_timeout: Duration::from_millis(50),
            ..options()
        };

        let err = drive_page(&page, URL, &script(), &options).await.unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { what: "page load", .. }));
    }

    #[tokio::test]
    async fn test_evaluation_times_out() {
        let page = FakePage {
            script: Step::Hang,
            ..FakePage::returning(json!(0))
        };
        let options = BrowserOptions {
            eval_timeout: Duration::from_millis(50),
            ..options()
        };

        let err = drive_page(&page, URL, &script(), &options).await.unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { what: "in-page evaluation", .. }));
    }

    #[tokio::test]
    async fn test_non_integer_result_is_invalid() {
        let page = FakePage::returning(Value::Null);
        let err = drive_page(&page, URL, &script(), &options()).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidResult(_)));
    }

    #[tokio::test]
    async fn test_slow_motion_delays_each_step() {
        let page = FakePage::returning(json!(0));
        let options = BrowserOptions {
            slow_motion: Some(Duration::from_millis(40)),
            ..options()
        };

        let started = Instant::now();
        drive_page(&page, URL, &script(), &options).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_remote_values() {
        let remote = |value: Value| -> RemoteObject { serde_json::from_value(value).unwrap() };

        assert_eq!(remote_value(&remote(json!({ "type": "number", "value": 3 }))), json!(3));
        assert_eq!(
            remote_value(&remote(json!({ "type": "bigint", "unserializableValue": "7n" }))),
            json!("7")
        );
        assert_eq!(remote_value(&remote(json!({ "type": "undefined" }))), Value::Null);
    }

    #[test]
    fn test_bigint_status_decodes() {
        let object: RemoteObject =
            serde_json::from_value(json!({ "type": "bigint", "unserializableValue": "7n" })).unwrap();
        assert_eq!(protocol::decode_status(&remote_value(&object)).unwrap(), 7);
    }

    #[test]
    fn test_explicit_executable_builds_config() {
        let profile = tempfile::tempdir().unwrap();
        let options = BrowserOptions {
            executable: Some(PathBuf::from("/opt/chromium/chrome")),
            ..options()
        };
        assert!(options.browser_config(profile.path()).is_ok());
    }
}
