//! In-memory document store.

use crate::store::{report_order, ReportStream, STREAM_CAPACITY};
use crate::{CreateReportInput, DocumentStore, Report, StoreError, StoreResult, UpdateReportInput};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Process-local [`DocumentStore`]. Live queries are driven by a change
/// signal carrying the affected user id.
#[derive(Default)]
pub struct MemoryDocumentStore {
    shared: Arc<Shared>,
}

/// State shared with live query tasks.
struct Shared {
    reports: RwLock<HashMap<String, Report>>,
    changes: broadcast::Sender<String>,
}

impl Default for Shared {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            reports: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Shared {
    fn snapshot(&self, user_id: &str) -> Vec<Report> {
        let mut reports: Vec<Report> = self
            .reports
            .read()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reports.sort_by(report_order);
        reports
    }

    fn changed(&self, user_id: &str) {
        let _ = self.changes.send(user_id.to_string());
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, user_id: &str, input: &CreateReportInput) -> StoreResult<Report> {
        let now = Utc::now();
        let report = Report {
            id: Uuid::new_v4().to_string(),
            date: input.date,
            expenses: input.expenses.clone(),
            labels: input.labels.clone(),
            total: input.total,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.shared
            .reports
            .write()
            .insert(report.id.clone(), report.clone());
        self.shared.changed(user_id);
        Ok(report)
    }

    async fn patch(
        &self,
        user_id: &str,
        report_id: &str,
        patch: &UpdateReportInput,
    ) -> StoreResult<Report> {
        let updated = {
            let mut reports = self.shared.reports.write();
            let report = reports
                .get_mut(report_id)
                .filter(|r| r.user_id == user_id)
                .ok_or_else(|| StoreError::NotFound(report_id.to_string()))?;
            patch.apply_to(report);
            report.updated_at = Utc::now();
            report.clone()
        };
        self.shared.changed(user_id);
        Ok(updated)
    }

    async fn remove(&self, user_id: &str, report_id: &str) -> StoreResult<()> {
        let removed = {
            let mut reports = self.shared.reports.write();
            match reports.get(report_id) {
                Some(r) if r.user_id == user_id => reports.remove(report_id).is_some(),
                _ => false,
            }
        };
        if removed {
            self.shared.changed(user_id);
        }
        Ok(())
    }

    async fn fetch(&self, user_id: &str, report_id: &str) -> StoreResult<Option<Report>> {
        Ok(self
            .shared
            .reports
            .read()
            .get(report_id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn query(&self, user_id: &str) -> StoreResult<Vec<Report>> {
        Ok(self.shared.snapshot(user_id))
    }

    async fn subscribe(&self, user_id: &str) -> StoreResult<ReportStream> {
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let mut changes = self.shared.changes.subscribe();

        // Initial emission happens before the task starts so it always wins
        // the race with later changes.
        if tx.send(Ok(self.shared.snapshot(user_id))).await.is_err() {
            return Ok(rx);
        }

        let reports = self.shared.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(changed) if changed == user_id => {
                            let current = reports.snapshot(&user_id);
                            if tx.send(Ok(current)).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Live report query lagged, re-reading");
                            if tx.send(Ok(reports.snapshot(&user_id))).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!(user_id = %user_id, "Live report query ended");
        });

        Ok(rx)
    }
}
