use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use bagger_core::{RecordFilter, StatusFilter};
use bagger_engine::{ArchiveFormat, Credentials, NetSettings, PackageAction, PipelineSettings};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, ValueEnum};

/// Download records from an EPrints server and bag them up.
///
/// Contacts the REST API of an EPrints server, writes one subdirectory per
/// record containing its EP3 XML metadata and document files, and by
/// default turns each subdirectory into a validated BagIt bag serialized as
/// a single verified archive file.
#[derive(Debug, Parser)]
#[command(name = "eprints-bagger", version, about, long_about = None)]
pub struct Args {
    /// URL of the server's REST API, e.g. https://server.example.edu/rest
    #[arg(short = 'a', long)]
    pub api_url: String,

    /// Base name for record subdirectories, producing "{name}-{number}"
    #[arg(short = 'b', long)]
    pub base_name: Option<String>,

    /// Milliseconds to wait between fetching consecutive records
    #[arg(short = 'd', long, default_value_t = 100)]
    pub delay: u64,

    /// Records to get: a number, a comma-separated list, an inclusive A-B
    /// range, or the path of a file listing one record number per line.
    /// Without this, every record the server lists is fetched.
    #[arg(short = 'f', long)]
    pub fetch_list: Option<String>,

    /// Do not count missing records as an error
    #[arg(short = 'm', long)]
    pub missing_ok: bool,

    /// Directory to write output to
    #[arg(short = 'o', long)]
    pub output_dir: PathBuf,

    /// User name for the server (or set EPRINTS_USER)
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Password for the server (or set EPRINTS_PASSWORD)
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Keep only records modified on or after this date, e.g. 2021-01-01
    #[arg(long)]
    pub lastmod: Option<String>,

    /// Keep only records whose status is in this comma-separated list;
    /// a leading ^ inverts the match, e.g. ^deletion
    #[arg(long)]
    pub status: Option<String>,

    /// What to do with each record directory after populating it
    #[arg(long, value_enum, default_value_t = ActionArg::BagAndArchive)]
    pub bag_action: ActionArg,

    /// Also package the entire output directory as one unit at the end
    #[arg(long, value_enum, default_value_t = ActionArg::None)]
    pub collection_action: ActionArg,

    /// Archive format used whenever an archive is produced
    #[arg(long, value_enum, default_value_t = FormatArg::TarGz)]
    pub archive_format: FormatArg,

    /// Write log output to this file instead of the terminal
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Only print warnings and errors while working
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Leave the populated directory as-is.
    None,
    /// Create and validate a bag.
    Bag,
    /// Create a bag, archive it, verify, and delete the directory.
    BagAndArchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Zip,
    ZipStored,
    Tar,
    TarGz,
}

impl From<FormatArg> for ArchiveFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Zip => ArchiveFormat::ZipDeflated,
            FormatArg::ZipStored => ArchiveFormat::ZipStored,
            FormatArg::Tar => ArchiveFormat::Tar,
            FormatArg::TarGz => ArchiveFormat::TarGz,
        }
    }
}

fn package_action(action: ActionArg, format: FormatArg) -> PackageAction {
    match action {
        ActionArg::None => PackageAction::None,
        ActionArg::Bag => PackageAction::Bag,
        ActionArg::BagAndArchive => PackageAction::BagAndArchive(format.into()),
    }
}

impl Args {
    /// Validates the arguments and builds the settings for one run.
    pub fn build_settings(&self) -> anyhow::Result<(NetSettings, PipelineSettings)> {
        if !self.api_url.starts_with("http") {
            bail!("the API URL must be a full http(s) URL: {}", self.api_url);
        }

        let credentials = resolve_credentials(self.user.clone(), self.password.clone());

        let lastmod_after = match &self.lastmod {
            None => None,
            Some(text) => Some(
                parse_lastmod_argument(text)
                    .with_context(|| format!("cannot parse date \"{text}\""))?,
            ),
        };
        let filter = RecordFilter {
            lastmod_after,
            status: self.status.as_deref().map(StatusFilter::parse),
        };

        let name_prefix = match &self.base_name {
            Some(base) => format!("{base}-"),
            None => String::new(),
        };

        let net = NetSettings {
            credentials,
            ..NetSettings::default()
        };
        let pipeline = PipelineSettings {
            output_dir: self.output_dir.clone(),
            name_prefix,
            delay: Duration::from_millis(self.delay),
            missing_ok: self.missing_ok,
            filter,
            record_action: package_action(self.bag_action, self.archive_format),
            collection_action: package_action(self.collection_action, self.archive_format),
        };
        Ok((net, pipeline))
    }
}

/// Explicit flags win; the environment is the fallback. Interactive and
/// keyring-based prompting is deliberately not part of this program.
fn resolve_credentials(user: Option<String>, password: Option<String>) -> Option<Credentials> {
    let user = user.or_else(|| std::env::var("EPRINTS_USER").ok())?;
    let password = password
        .or_else(|| std::env::var("EPRINTS_PASSWORD").ok())
        .unwrap_or_default();
    Some(Credentials { user, password })
}

fn parse_lastmod_argument(text: &str) -> anyhow::Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("date has no midnight; this cannot happen")?;
        return Ok(midnight.and_utc());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime.and_utc());
    }
    bail!("expected YYYY-MM-DD or \"YYYY-MM-DD HH:MM:SS\"");
}
