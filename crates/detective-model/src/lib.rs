//! Shared model for Open Detective.
//!
//! Everything downstream (resolver, store boundary, analytics, composer) speaks
//! in the types defined here:
//!
//! ```text
//! ┌──────────────────┐   snapshot()   ┌──────────────────┐
//! │  CatalogHandle   │───────────────►│  MetricCatalog   │  (immutable, versioned)
//! │  (RwLock<Arc<_>>)│◄── refresh() ──│  repos.json      │
//! └──────────────────┘                └──────────────────┘
//!
//!  ProjectId + MetricKind ──► store ──► MetricRow { project_id, time_bucket, value, is_forecast }
//! ```
//!
//! - A catalog snapshot is never mutated in place; reloads swap the `Arc`.
//! - `MetricRow` is the single normalized row shape. The store boundary is the
//!   only place that knows about column-name variants.

pub mod bucket;
pub mod catalog;
pub mod metric;
pub mod row;

pub use bucket::{add_months, parse_bucket, BucketError};
pub use catalog::{CatalogError, CatalogHandle, MetricCatalog};
pub use metric::{MetricKind, ProjectId, UnknownMetric};
pub use row::MetricRow;
