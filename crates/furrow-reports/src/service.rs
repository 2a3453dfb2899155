//! Session-scoped report operations.

use crate::cache::ReportCache;
use crate::{
    CreateReportInput, DocumentStore, Report, StoreError, StoreResult, UpdateReportInput,
};
use furrow_auth::SessionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Typed report operations for the signed-in user.
///
/// Every call reads the owner from the session at call time, and the cache
/// is emptied whenever that owner changes. Mutations invalidate the cache
/// only after the store call succeeds.
pub struct ReportService {
    session: Arc<SessionManager>,
    store: Arc<dyn DocumentStore>,
    cache: Arc<ReportCache>,
}

impl ReportService {
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<dyn DocumentStore>,
        list_stale: Duration,
    ) -> Self {
        Self {
            session,
            store,
            cache: Arc::new(ReportCache::new(list_stale)),
        }
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    fn owner(&self) -> StoreResult<String> {
        match self.session.current_user() {
            Some(user) => {
                self.cache.scope_to(&user.user_id);
                Ok(user.user_id)
            }
            None => {
                self.cache.clear();
                Err(StoreError::Unauthenticated)
            }
        }
    }

    /// Reading another user's reports is refused locally before any request.
    fn owner_matching(&self, user_id: &str) -> StoreResult<String> {
        let owner = self.owner()?;
        if owner != user_id {
            return Err(StoreError::Forbidden(format!(
                "reports of {} are not visible to {}",
                user_id, owner
            )));
        }
        Ok(owner)
    }

    /// Create a report owned by the current user and return its id.
    pub async fn create_report(&self, input: CreateReportInput) -> StoreResult<String> {
        let owner = self.owner()?;
        input.validate()?;

        let report = self.store.insert(&owner, &input).await?;
        self.cache.invalidate_lists();
        info!(report_id = %report.id, user_id = %owner, "Report created");
        Ok(report.id)
    }

    /// Apply a partial update. Missing reports are `NotFound`.
    pub async fn update_report(
        &self,
        report_id: &str,
        patch: UpdateReportInput,
    ) -> StoreResult<Report> {
        let owner = self.owner()?;
        patch.validate()?;

        let report = self.store.patch(&owner, report_id, &patch).await?;
        self.cache.invalidate_lists();
        self.cache.invalidate_detail(&owner, report_id);
        info!(report_id, user_id = %owner, "Report updated");
        Ok(report)
    }

    /// Delete a report. Deleting a missing report succeeds.
    pub async fn delete_report(&self, report_id: &str) -> StoreResult<()> {
        let owner = self.owner()?;

        self.store.remove(&owner, report_id).await?;
        self.cache.invalidate_lists();
        self.cache.invalidate_detail(&owner, report_id);
        info!(report_id, user_id = %owner, "Report deleted");
        Ok(())
    }

    pub async fn get_report(&self, report_id: &str) -> StoreResult<Option<Report>> {
        let owner = self.owner()?;
        if let Some(report) = self.cache.get_detail(&owner, report_id, Instant::now()) {
            debug!(report_id, "Report served from cache");
            return Ok(Some(report));
        }

        let report = self.store.fetch(&owner, report_id).await?;
        if let Some(report) = &report {
            self.cache.put_detail(report.clone(), Instant::now());
        }
        Ok(report)
    }

    /// All of `user_id`'s reports, newest date first.
    pub async fn list_reports(&self, user_id: &str) -> StoreResult<Vec<Report>> {
        let owner = self.owner_matching(user_id)?;
        if let Some(reports) = self.cache.get_list(&owner, Instant::now()) {
            debug!(user_id = %owner, "Report list served from cache");
            return Ok(reports);
        }

        let reports = self.store.query(&owner).await?;
        self.cache.put_list(&owner, reports.clone(), Instant::now());
        Ok(reports)
    }

    /// Live version of [`ReportService::list_reports`]. `on_change` receives
    /// the full collection right away and after every change until the
    /// returned handle is released.
    pub async fn subscribe_to_reports<F>(
        &self,
        user_id: &str,
        mut on_change: F,
    ) -> StoreResult<ReportSubscription>
    where
        F: FnMut(Vec<Report>) + Send + 'static,
    {
        let owner = self.owner_matching(user_id)?;
        let mut stream = self.store.subscribe(&owner).await?;
        let cache = self.cache.clone();

        let handle = tokio::spawn(async move {
            while let Some(message) = stream.recv().await {
                match message {
                    Ok(reports) => {
                        cache.put_list(&owner, reports.clone(), Instant::now());
                        on_change(reports);
                    }
                    Err(e) => warn!(user_id = %owner, error = %e, "Live report query error"),
                }
            }
            debug!(user_id = %owner, "Report subscription finished");
        });

        Ok(ReportSubscription {
            handle: Some(handle),
        })
    }
}

/// Handle for a live report query. Released by [`ReportSubscription::unsubscribe`]
/// or on drop.
pub struct ReportSubscription {
    handle: Option<JoinHandle<()>>,
}

impl ReportSubscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Report subscription released");
        }
    }
}

impl Drop for ReportSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
