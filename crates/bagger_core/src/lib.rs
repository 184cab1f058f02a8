//! Bagger core: pure record-selection logic shared by the engine and the app.
mod filter;
mod idspec;
mod summary;

pub use filter::{RecordFilter, StatusFilter};
pub use idspec::{resolve_id_spec, IdSpec, IdSpecError};
pub use summary::{RunSummary, SUMMARY_LIST_CAP};
