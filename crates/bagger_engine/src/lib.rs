//! Bagger engine: record acquisition and archival packaging pipeline.
mod archive;
mod bag;
mod download;
mod eprints;
mod net;
mod persist;
mod pipeline;
mod types;

pub use archive::{archive_and_remove, verify_archive, write_archive, ArchiveError, ArchiveFormat};
pub use bag::{make_bag, Bag, BagError, BagInfo, ChecksumAlgorithm, DEFAULT_ALGORITHMS};
pub use download::download_documents;
pub use eprints::{DocumentRef, EprintRecord, RecordFetch, RecordSource, EPRINTS_XMLNS};
pub use net::{network_available, Credentials, HttpClient, NetSettings};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{PackageAction, Pipeline, PipelineSettings};
pub use types::{EngineError, LogReporter, NetError, Reporter};
