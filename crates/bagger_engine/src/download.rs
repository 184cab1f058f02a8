use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::net::HttpClient;
use crate::types::{EngineError, NetError, Reporter};

/// How many unexpected failures to tolerate per document before escalating.
const MAX_ITEM_FAILURES: usize = 3;

/// Downloads each URL into `output_dir`, named by the URL's final path
/// segment, streaming response bodies to disk in chunks.
///
/// Failure handling per item:
/// - taxonomy failures (no content, authentication, service) are tolerated
///   and logged only under `missing_ok`; otherwise the first one aborts the
///   whole run;
/// - anything unexpected is retried a bounded number of times and then
///   escalated regardless of `missing_ok`.
///
/// Returns the paths actually written; skipped items are absent.
pub async fn download_documents(
    client: &HttpClient,
    urls: &[String],
    output_dir: &Path,
    missing_ok: bool,
    reporter: &dyn Reporter,
) -> Result<Vec<PathBuf>, EngineError> {
    let mut written = Vec::new();
    for url in urls {
        let destination = output_dir.join(file_name_for_url(url)?);
        reporter.inform(&format!("Downloading {url}"));

        let mut failures = 0usize;
        loop {
            match fetch_to_file(client, url, &destination).await {
                Ok(()) => {
                    written.push(destination.clone());
                    break;
                }
                Err(EngineError::Net(err)) if err.tolerable_when_missing_ok() => {
                    if missing_ok {
                        reporter.alert(&err.to_string());
                        break;
                    }
                    return Err(err.into());
                }
                Err(EngineError::Net(err)) => return Err(err.into()),
                Err(err) => {
                    // Something unexpected, possibly transient. Retry this
                    // item a few times in case we're up against a roadblock.
                    failures += 1;
                    log::debug!("download failure #{failures} for {url}: {err}");
                    if failures >= MAX_ITEM_FAILURES {
                        return Err(err);
                    }
                }
            }
        }
    }
    Ok(written)
}

async fn fetch_to_file(
    client: &HttpClient,
    url: &str,
    destination: &Path,
) -> Result<(), EngineError> {
    let response = client.get(url, false).await?;

    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut bytes_written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| NetError::Network(err.to_string()))?;
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await?;
    log::debug!("wrote {bytes_written} bytes to {}", destination.display());
    Ok(())
}

/// The local file name for a document URL: its final non-empty path segment.
fn file_name_for_url(url: &str) -> Result<String, EngineError> {
    let parsed = url::Url::parse(url)
        .map_err(|err| EngineError::Parse(format!("bad document url {url}: {err}")))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(str::to_string)
        .ok_or_else(|| EngineError::Parse(format!("no file name in document url {url}")))
}
