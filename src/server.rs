//! Ephemeral static file server
//!
//! Serves one directory read-only over HTTP on 127.0.0.1 for the duration of a run. The listener is bound
//! synchronously in [`StaticServer::start`], so the server is accepting connections before `start` returns.
//! Requests are served on a dedicated thread with its own single-threaded runtime; no request logging layer is
//! installed.
//!
//! [`StaticServer::stop`] signals shutdown and joins the serving thread, so the port is free once it returns.
//! Dropping the handle stops the server as well.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::Path;
use std::thread::JoinHandle;

use axum::Router;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;

use crate::error::{HarnessError, HarnessResult};

/// Handle to a running static file server.
#[derive(Debug)]
pub struct StaticServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<std::io::Result<()>>>,
}

impl StaticServer {
    /// Start serving `root` on `127.0.0.1:port`.
    ///
    /// ## Errors
    ///
    /// Returns `ServerStart` if the port cannot be bound or the serving thread cannot be spawned.
    pub fn start(root: &Path, port: u16) -> HarnessResult<Self> {
        let server_start = |source| HarnessError::ServerStart { port, source };

        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).map_err(server_start)?;
        listener.set_nonblocking(true).map_err(server_start)?;
        let addr = listener.local_addr().map_err(server_start)?;

        let router = Router::new().fallback_service(ServeDir::new(root));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("static-server".to_string())
            .spawn(move || serve(listener, router, shutdown_rx))
            .map_err(server_start)?;

        tracing::info!(%addr, root = %root.display(), "static file server listening");

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL of the server, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of a file directly under the served root.
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url(), file_name)
    }

    /// Whether `stop` has not been called yet.
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop accepting connections and wait for the serving thread to exit.
    ///
    /// Calling this more than once is a no-op.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The receiver is gone only if the serving thread already exited
            let _ = shutdown.send(());
        }
        let Some(thread) = self.thread.take() else {
            return;
        };
        match thread.join() {
            Ok(Ok(())) => tracing::info!(addr = %self.addr, "static file server stopped"),
            Ok(Err(e)) => tracing::warn!(addr = %self.addr, error = %e, "static file server exited with error"),
            Err(_) => tracing::error!(addr = %self.addr, "static file server thread panicked"),
        }
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serving thread body.
fn serve(listener: TcpListener, router: Router, shutdown: oneshot::Receiver<()>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.await;
            })
            .await
    })
}
