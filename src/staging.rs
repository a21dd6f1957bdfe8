//! Artifact staging area
//!
//! Assembles the serving root for one run: the compiled module, its loader script and the host page, copied
//! into a freshly created temporary directory. The directory is deleted when the [`StagingArea`] is closed or
//! dropped, on every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::{HostPage, RunConfig};
use crate::error::{HarnessError, HarnessResult};

/// Host page template compiled into the harness. `{{loader}}` stands for the loader script's file name.
pub const EMBEDDED_HOST_PAGE: &str = include_str!("../assets/browser_main.html");

const LOADER_PLACEHOLDER: &str = "{{loader}}";

const STAGING_PREFIX: &str = "wasm-harness-";

/// A staged serving root. Owns the directory and everything in it.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    page_name: String,
}

impl StagingArea {
    /// Stage the artifacts named by `config` into a fresh directory under its work root.
    ///
    /// ## Errors
    ///
    /// Returns `MissingArtifact` if the module, the loader, or a file-based host page template does not exist.
    /// Sources are checked before the directory is created.
    pub fn stage(config: &RunConfig) -> HarnessResult<Self> {
        let layout = &config.layout;
        let module = require(config.artifact_path(&layout.module_file()))?;
        let loader = require(config.artifact_path(&layout.loader_file()))?;
        let template = match &config.host_page {
            HostPage::Embedded => None,
            HostPage::File(path) => Some(require(path.clone())?),
        };

        let work_root = config.effective_work_root();
        fs::create_dir_all(&work_root)?;
        let dir = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(&work_root)?;

        fs::copy(&module, dir.path().join(layout.module_file()))?;
        fs::copy(&loader, dir.path().join(layout.loader_file()))?;
        let page_path = dir.path().join(&layout.page_name);
        match template {
            Some(template) => {
                fs::copy(&template, &page_path)?;
            }
            None => fs::write(&page_path, render_embedded_page(&layout.loader_file()))?,
        }

        tracing::info!(dir = %dir.path().display(), "staged build artifacts");

        Ok(Self {
            dir,
            page_name: layout.page_name.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// File name of the staged host page.
    pub fn page_name(&self) -> &str {
        &self.page_name
    }

    /// Delete the staged directory, reporting any failure.
    pub fn close(self) -> HarnessResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(dir = %path.display(), "removed staging directory");
        Ok(())
    }
}

/// The built-in host page, loading `loader_file`.
pub fn render_embedded_page(loader_file: &str) -> String {
    EMBEDDED_HOST_PAGE.replace(LOADER_PLACEHOLDER, loader_file)
}

fn require(path: PathBuf) -> HarnessResult<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(HarnessError::MissingArtifact { path })
    }
}
