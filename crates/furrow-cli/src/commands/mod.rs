//! CLI command implementations.

mod auth;
mod reports;

pub use auth::{login, login_google, logout, signup, status};
pub use reports::{
    reports_create, reports_delete, reports_list, reports_show, reports_update, reports_watch,
    CreateArgs, UpdateArgs,
};

use anyhow::{Context, Result};
use furrow_auth::{SessionManager, SessionUser, SupabaseAuthClient};
use furrow_config_and_utils::{init_logging, Config, Paths};
use furrow_reports::{ReportService, SupabaseDocumentStore};
use furrow_storage::create_snapshot_manager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything a command needs: the settled session and the report service.
pub struct App {
    pub session: Arc<SessionManager>,
    pub reports: ReportService,
}

impl App {
    /// Load config, start logging, and wait for the session to settle.
    pub async fn start(base_dir: Option<PathBuf>, log_level: Option<&str>) -> Result<Self> {
        let paths = match base_dir {
            Some(dir) => Paths::with_base_dir(dir),
            None => Paths::new()?,
        };
        paths.ensure_dirs()?;

        let config = Config::load(&paths).context("failed to load config")?;
        init_logging(log_level.unwrap_or(&config.log_level), &paths)?;

        let snapshots = Arc::new(create_snapshot_manager(&paths)?);
        let auth = Arc::new(SupabaseAuthClient::new(&config, snapshots.clone()));
        let session = Arc::new(SessionManager::with_persistence(auth.clone(), snapshots));
        session.initialize();
        session.wait_until_settled().await;
        debug!(phase = ?session.phase(), "Session settled");

        let store = Arc::new(SupabaseDocumentStore::new(&config, auth));
        let reports = ReportService::new(
            session.clone(),
            store,
            Duration::from_secs(config.list_stale_secs),
        );

        Ok(Self { session, reports })
    }

    /// The signed-in user, or a hint to log in.
    pub fn require_user(&self) -> Result<SessionUser> {
        self.session
            .current_user()
            .context("Not logged in. Run 'furrow login' first")
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.session.teardown();
    }
}
