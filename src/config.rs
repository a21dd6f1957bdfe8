//! Run configuration for the harness
//!
//! A [`RunConfig`] is built once (from the CLI or by a caller of the library) and is not modified after the
//! run starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ceiling for a single in-page evaluation (WASM compile + instantiate + suite).
pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Default ceiling for the host page to finish loading.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ceiling for the browser to launch and accept the automation connection.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable consulted for an explicit browser executable.
pub const BROWSER_ENV_VAR: &str = "WASM_HARNESS_BROWSER";

/// Fixed names shared between the build output, the host page and the in-page protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// File stem of the compiled module and its loader (`<stem>.wasm`, `<stem>.js`)
    pub module_stem: String,
    /// File name the host page is staged under
    pub page_name: String,
    /// Global async factory the loader defines; resolves to the module handle
    pub entry_point: String,
    /// Label printed in the console banners
    pub suite_label: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            module_stem: "test_xsimd".to_string(),
            page_name: "browser_main.html".to_string(),
            entry_point: "test_xsimd_wasm".to_string(),
            suite_label: "XSIMD WASM TESTS".to_string(),
        }
    }
}

impl ArtifactLayout {
    /// File name of the compiled module.
    pub fn module_file(&self) -> String {
        format!("{}.wasm", self.module_stem)
    }

    /// File name of the loader script.
    pub fn loader_file(&self) -> String {
        format!("{}.js", self.module_stem)
    }

    pub fn with_module_stem(mut self, stem: impl Into<String>) -> Self {
        self.module_stem = stem.into();
        self
    }

    pub fn with_suite_label(mut self, label: impl Into<String>) -> Self {
        self.suite_label = label.into();
        self
    }
}

/// Where the host page template comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostPage {
    /// The template compiled into the harness (`assets/browser_main.html`)
    #[default]
    Embedded,
    /// A template file on disk
    File(PathBuf),
}

/// Configuration for one harness run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Build output directory holding the module and its loader
    pub build_dir: PathBuf,
    /// Run the browser without a visible window
    pub headless: bool,
    /// Delay inserted before every browser automation command
    pub slow_motion: Option<Duration>,
    /// Ceiling for the in-page evaluation
    pub eval_timeout: Duration,
    /// Ceiling for the host page load
    pub navigation_timeout: Duration,
    /// Ceiling for the browser to come up
    pub launch_timeout: Duration,
    /// Explicit browser executable; auto-detected when absent
    pub browser: Option<PathBuf>,
    /// Keep the browser's own process sandbox enabled (off by default, as in most automation setups)
    pub browser_sandbox: bool,
    /// Parent directory for the ephemeral serving root; the OS temp dir when absent
    pub work_root: Option<PathBuf>,
    pub layout: ArtifactLayout,
    pub host_page: HostPage,
}

impl RunConfig {
    /// Create a config for `build_dir` with default settings.
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            headless: true,
            slow_motion: None,
            eval_timeout: DEFAULT_EVAL_TIMEOUT,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            browser: None,
            browser_sandbox: false,
            work_root: None,
            layout: ArtifactLayout::default(),
            host_page: HostPage::default(),
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_slow_motion(mut self, delay: Option<Duration>) -> Self {
        self.slow_motion = delay;
        self
    }

    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = timeout;
        self
    }

    pub fn with_browser(mut self, browser: Option<PathBuf>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_browser_sandbox(mut self, sandbox: bool) -> Self {
        self.browser_sandbox = sandbox;
        self
    }

    pub fn with_work_root(mut self, work_root: Option<PathBuf>) -> Self {
        self.work_root = work_root;
        self
    }

    pub fn with_layout(mut self, layout: ArtifactLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_host_page(mut self, host_page: HostPage) -> Self {
        self.host_page = host_page;
        self
    }

    /// Directory the serving root is created in.
    pub fn effective_work_root(&self) -> PathBuf {
        self.work_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Expected path of a build artifact.
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        Path::new(&self.build_dir).join(file_name)
    }
}
