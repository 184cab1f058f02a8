//! Command-line front end for the EPrints bagger.

mod args;
mod exit;

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bagger_core::{resolve_id_spec, IdSpecError, RunSummary};
use bagger_engine::{
    network_available, EngineError, HttpClient, LogReporter, NetSettings, PipelineSettings,
    Pipeline, RecordSource,
};
use bagger_logging::LogDestination;
use clap::Parser;
use log::{error, info, warn};

use crate::args::Args;
use crate::exit::ExitStatus;

/// Common ext2/ext3 file systems start struggling past this many entries
/// in one directory, so warn before writing more.
const SUBDIR_ADVISORY_LIMIT: usize = 31_998;

fn main() -> ExitCode {
    let args = Args::parse();
    let destination = match &args.log_file {
        Some(path) => LogDestination::File(path.clone()),
        None => LogDestination::Terminal,
    };
    bagger_logging::initialize(destination, args.quiet);
    ExitCode::from(run(&args).code())
}

fn run(args: &Args) -> ExitStatus {
    let (net, pipeline_settings) = match args.build_settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err:#}");
            return ExitStatus::BadArgument;
        }
    };

    let spec = match resolve_id_spec(args.fetch_list.as_deref()) {
        Ok(spec) => spec,
        Err(err @ IdSpecError::Invalid(_)) => {
            error!("{err}");
            return ExitStatus::BadArgument;
        }
        Err(err @ IdSpecError::FileRead { .. }) => {
            error!("{err}");
            return ExitStatus::FileError;
        }
    };

    if !network_available() {
        error!("No network connection detected.");
        return ExitStatus::NoNetwork;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Cannot start the async runtime: {err}");
            return ExitStatus::Exception;
        }
    };

    runtime.block_on(async {
        match execute(args, net, pipeline_settings, spec).await {
            Ok(summary) => {
                for line in summary.report_lines() {
                    info!("{line}");
                }
                if summary.interrupted {
                    ExitStatus::UserInterrupt
                } else {
                    ExitStatus::Success
                }
            }
            Err(err) => {
                error!("{err}");
                ExitStatus::for_error(&err)
            }
        }
    })
}

async fn execute(
    args: &Args,
    net: NetSettings,
    settings: PipelineSettings,
    spec: bagger_core::IdSpec,
) -> Result<RunSummary, EngineError> {
    let client = HttpClient::new(net)?;
    let source = RecordSource::new(client, args.api_url.clone());
    let pipeline = Pipeline::new(source, settings, Arc::new(LogReporter));

    let interrupt = pipeline.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.store(true, Ordering::Relaxed);
        }
    });

    let wanted = pipeline.resolve_ids(&spec).await?;
    info!(
        "{} record{} to fetch",
        wanted.len(),
        if wanted.len() == 1 { "" } else { "s" }
    );
    if wanted.len() > SUBDIR_ADVISORY_LIMIT {
        warn!(
            "Writing more than {SUBDIR_ADVISORY_LIMIT} subdirectories; some \
             file systems handle directories this large poorly."
        );
    }

    pipeline.run(&wanted).await
}
