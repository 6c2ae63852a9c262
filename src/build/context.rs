//! Build context shared by every task of a run.

use crate::build::progress::{NullProgress, ProgressReporter};
use crate::cache::TransformCache;
use crate::config::ProjectConfig;
use crate::livereload::LiveReload;
use crate::server::{DevServer, ServerError, ServerHandle, ServerOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Build context containing configuration, paths and shared services.
///
/// Tasks receive the context by reference; fan-out steps share one context
/// across worker threads, so everything mutable in here is synchronized.
pub struct BuildContext {
    /// The loaded configuration
    config: ProjectConfig,
    /// Project root directory (where sitepipe.toml is located)
    project_root: PathBuf,
    /// Maximum concurrent tasks in a fan-out step (`None`: all at once)
    jobs: Option<usize>,
    reporter: Arc<dyn ProgressReporter>,
    reload: LiveReload,
    /// Dev server, once started
    server: Mutex<Option<ServerHandle>>,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("project_root", &self.project_root)
            .field("jobs", &self.jobs)
            .field("server", &self.server_addr())
            .finish()
    }
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    pub fn new(config: ProjectConfig, project_root: PathBuf) -> Self {
        Self {
            config,
            project_root,
            jobs: None,
            reporter: Arc::new(NullProgress::new()),
            reload: LiveReload::new(),
            server: Mutex::new(None),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn jobs(&self) -> Option<usize> {
        self.jobs
    }

    pub fn reporter(&self) -> &dyn ProgressReporter {
        self.reporter.as_ref()
    }

    /// Live-reload channel shared with the dev server.
    pub fn reload(&self) -> &LiveReload {
        &self.reload
    }

    /// Limit fan-out concurrency.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs.map(|n| n.max(1));
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }

    /// Transformation cache at the configured location.
    pub fn cache(&self) -> TransformCache {
        TransformCache::new(self.resolve_path(&self.config.cache.dir))
    }

    /// Start the dev server unless it is already running.
    pub fn start_server(&self) -> Result<SocketAddr, ServerError> {
        let mut server = self.lock_server();
        if let Some(handle) = server.as_ref() {
            return Ok(handle.addr());
        }

        let options = ServerOptions::from_config(&self.config.server, &self.project_root);
        let handle = DevServer::spawn(options, self.reload.clone())?;
        let addr = handle.addr();
        *server = Some(handle);
        Ok(addr)
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.lock_server().as_ref().map(ServerHandle::addr)
    }

    /// Take ownership of the running server, if any.
    pub fn take_server(&self) -> Option<ServerHandle> {
        self.lock_server().take()
    }

    fn lock_server(&self) -> MutexGuard<'_, Option<ServerHandle>> {
        self.server.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
