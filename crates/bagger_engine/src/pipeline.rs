use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bagger_core::{IdSpec, RecordFilter, RunSummary};

use crate::archive::{self, ArchiveFormat};
use crate::bag::{self, BagInfo, DEFAULT_ALGORITHMS};
use crate::download::download_documents;
use crate::eprints::{EprintRecord, RecordFetch, RecordSource};
use crate::persist::ensure_output_dir;
use crate::types::{EngineError, Reporter};

/// What to do with a populated directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    /// Leave the plain directory in place.
    None,
    /// Restructure into a bag and validate it.
    Bag,
    /// Bag, serialize into a single archive, verify, delete the directory.
    BagAndArchive(ArchiveFormat),
}

/// Terminal state of one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Done,
    Missing,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_dir: PathBuf,
    /// Prepended to record directory and file names; empty by default.
    pub name_prefix: String,
    /// Courtesy throttle between consecutive records, not a correctness
    /// requirement.
    pub delay: Duration,
    pub missing_ok: bool,
    pub filter: RecordFilter,
    pub record_action: PackageAction,
    /// Optional second-level packaging of the whole output directory.
    pub collection_action: PackageAction,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            name_prefix: String::new(),
            delay: Duration::from_millis(100),
            missing_ok: false,
            filter: RecordFilter::default(),
            record_action: PackageAction::BagAndArchive(ArchiveFormat::TarGz),
            collection_action: PackageAction::None,
        }
    }
}

/// Sequences fetch, filter, populate and package for each identifier.
///
/// Processing is strictly sequential across identifiers; one record is
/// fully handled before the next begins. The only cross-record state is
/// the running tallies in [`RunSummary`].
pub struct Pipeline {
    source: RecordSource,
    settings: PipelineSettings,
    reporter: Arc<dyn Reporter>,
    interrupt: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        source: RecordSource,
        settings: PipelineSettings,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            source,
            settings,
            reporter,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between identifiers; setting it stops the run at the
    /// next record boundary, keeping all output written so far.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Resolves an identifier specification, consulting the server listing
    /// when none was given.
    pub async fn resolve_ids(&self, spec: &IdSpec) -> Result<Vec<String>, EngineError> {
        match spec {
            IdSpec::Explicit(ids) => Ok(ids.clone()),
            IdSpec::ServerListing => {
                self.reporter
                    .inform(&format!("Asking {} for its record list", self.source.base_url()));
                let raw = self.source.fetch_listing().await?;
                RecordSource::listing_ids(&raw)
            }
        }
    }

    /// Runs the whole pipeline over `wanted`, in order.
    pub async fn run(&self, wanted: &[String]) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::new();
        ensure_output_dir(&self.settings.output_dir)?;

        for (index, number) in wanted.iter().enumerate() {
            if self.interrupt.load(Ordering::Relaxed) {
                self.reporter
                    .warn("Interrupted; stopping between records.");
                summary.interrupted = true;
                break;
            }
            if index > 0 && !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
            }
            match self.process_record(number).await? {
                RecordOutcome::Done => summary.record_done(),
                RecordOutcome::Missing => summary.record_missing(number),
                RecordOutcome::Skipped => summary.record_skipped(number),
            }
        }

        if !summary.interrupted {
            self.package_collection().await?;
        }
        Ok(summary)
    }

    async fn process_record(&self, number: &str) -> Result<RecordOutcome, EngineError> {
        let reporter = self.reporter.as_ref();
        reporter.inform(&format!("Getting record {number}"));

        let record = match self
            .source
            .fetch_record(number, self.settings.missing_ok, reporter)
            .await?
        {
            RecordFetch::Record(record) => record,
            RecordFetch::Missing => return Ok(RecordOutcome::Missing),
        };

        if !self
            .settings
            .filter
            .keeps(record.lastmod, &record.status)
        {
            reporter.inform(&format!(
                "Skipping record {number} (status {:?}, lastmod {:?})",
                record.status, record.lastmod
            ));
            return Ok(RecordOutcome::Skipped);
        }

        let record_dir = self
            .settings
            .output_dir
            .join(format!("{}{number}", self.settings.name_prefix));
        reporter.inform(&format!("Creating {}", record_dir.display()));
        ensure_output_dir(&record_dir)?;
        record.write_into(&record_dir, &self.settings.name_prefix, number)?;

        let documents: Vec<String> = record
            .documents()
            .into_iter()
            .map(str::to_string)
            .collect();
        download_documents(
            self.source.client(),
            &documents,
            &record_dir,
            self.settings.missing_ok,
            reporter,
        )
        .await?;

        self.package_directory(
            &record_dir,
            self.settings.record_action,
            &record_bag_info(&record, number, self.source.base_url()),
        )?;
        Ok(RecordOutcome::Done)
    }

    async fn package_collection(&self) -> Result<(), EngineError> {
        if self.settings.collection_action == PackageAction::None {
            return Ok(());
        }
        // The collection is packaged as one unit with no metadata record of
        // its own; the server base URL stands in as the external identifier.
        let dir_name = self
            .settings
            .output_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let info = BagInfo {
            internal_sender_identifier: dir_name,
            external_identifier: self.source.base_url().to_string(),
            external_description: format!(
                "Collection of records from the EPrints server at {}",
                self.source.base_url()
            ),
        };
        self.reporter.inform(&format!(
            "Packaging the whole of {}",
            self.settings.output_dir.display()
        ));
        let output_dir = self.settings.output_dir.clone();
        self.package_directory(&output_dir, self.settings.collection_action, &info)
    }

    fn package_directory(
        &self,
        dir: &Path,
        action: PackageAction,
        info: &BagInfo,
    ) -> Result<(), EngineError> {
        let reporter = self.reporter.as_ref();
        match action {
            PackageAction::None => {}
            PackageAction::Bag => {
                reporter.inform(&format!("Making bag out of {}", dir.display()));
                let bag = bag::make_bag(dir, &DEFAULT_ALGORITHMS, info)?;
                bag.validate()?;
            }
            PackageAction::BagAndArchive(format) => {
                reporter.inform(&format!("Making bag out of {}", dir.display()));
                let bag = bag::make_bag(dir, &DEFAULT_ALGORITHMS, info)?;
                bag.validate()?;
                reporter.inform(&format!(
                    "Creating {}.{} archive",
                    dir.display(),
                    format.extension()
                ));
                let comment = format!("{}\n{}", info.external_description, info.external_identifier);
                let archive_path = archive::archive_and_remove(dir, format, &comment)?;
                reporter.inform(&format!("Wrote {}", archive_path.display()));
            }
        }
        Ok(())
    }
}

/// Descriptive fields for one record's bag.
///
/// The external identifier prefers the record's official URL; failing that
/// its own id attribute; failing that the empty string. An empty value is
/// legitimate and is preserved rather than replaced with a synthetic one.
fn record_bag_info(record: &EprintRecord, number: &str, base_url: &str) -> BagInfo {
    let external_identifier = if !record.official_url.is_empty() {
        record.official_url.clone()
    } else {
        record.id.clone()
    };
    BagInfo {
        internal_sender_identifier: number.to_string(),
        external_identifier,
        external_description: format!(
            "Archive of record {number} from the EPrints server at {base_url}"
        ),
    }
}
