//! Farm expense reports: domain model, document stores and session-scoped
//! access.
//!
//! This crate provides:
//! - Report, expense and label types with their derived totals
//! - Deterministic currency and date formatting
//! - The `DocumentStore` contract with in-memory and Supabase implementations
//! - `ReportService`, which scopes every operation to the signed-in user

mod cache;
mod calculations;
mod error;
mod format;
mod memory;
mod model;
mod service;
mod store;
mod supabase;

pub use cache::ReportCache;
pub use calculations::{generate_unique_id, label_total, total};
pub use error::{StoreError, StoreResult};
pub use format::{
    format_currency, format_currency_in, format_date, format_date_in, parse_date, Locale,
};
pub use memory::MemoryDocumentStore;
pub use model::{CreateReportInput, Expense, Label, Report, UpdateReportInput};
pub use service::{ReportService, ReportSubscription};
pub use store::{report_order, DocumentStore, ReportStream};
pub use supabase::SupabaseDocumentStore;
