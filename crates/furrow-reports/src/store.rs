//! Document store contract.

use crate::{CreateReportInput, Report, StoreResult, UpdateReportInput};
use async_trait::async_trait;
use std::cmp::Ordering;
use tokio::sync::mpsc;

/// Live query results. Each message is the full ordered collection; dropping
/// the receiver ends the subscription.
pub type ReportStream = mpsc::Receiver<StoreResult<Vec<Report>>>;

/// Buffer size for live query channels.
pub(crate) const STREAM_CAPACITY: usize = 8;

/// Remote storage for report documents, keyed by `(user_id, report_id)`.
///
/// The store assigns `id`, `created_at` and `updated_at`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, user_id: &str, input: &CreateReportInput) -> StoreResult<Report>;

    /// Apply a partial patch and stamp `updated_at`. Missing report is `NotFound`.
    async fn patch(
        &self,
        user_id: &str,
        report_id: &str,
        patch: &UpdateReportInput,
    ) -> StoreResult<Report>;

    /// Deleting a missing report succeeds.
    async fn remove(&self, user_id: &str, report_id: &str) -> StoreResult<()>;

    async fn fetch(&self, user_id: &str, report_id: &str) -> StoreResult<Option<Report>>;

    /// All of a user's reports, newest `date` first.
    async fn query(&self, user_id: &str) -> StoreResult<Vec<Report>>;

    /// Live version of [`DocumentStore::query`]. Emits the current collection
    /// right away and again after every change.
    async fn subscribe(&self, user_id: &str) -> StoreResult<ReportStream>;
}

/// Ordering used by every query: `date` descending, then `created_at` descending.
pub fn report_order(a: &Report, b: &Report) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| b.created_at.cmp(&a.created_at))
}
