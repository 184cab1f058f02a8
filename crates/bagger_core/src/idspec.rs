use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdSpecError {
    #[error("invalid record specification: {0}")]
    Invalid(String),
    #[error("cannot read id list file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
}

/// The resolved form of a user-supplied record specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSpec {
    /// Process exactly these identifiers, in this order.
    Explicit(Vec<String>),
    /// No specification given; process whatever the server lists.
    ServerListing,
}

/// Resolves a user-supplied record specification into identifiers.
///
/// Accepted forms, tried in this order:
/// - nothing (or an empty string): use the server's own listing;
/// - a single non-negative integer;
/// - the path of an existing readable file, one identifier per line;
/// - a comma-separated mix of bare identifiers and inclusive `A-B` ranges.
///
/// Identifiers are kept as strings to avoid repeated numeric conversions,
/// and no deduplication is applied.
pub fn resolve_id_spec(spec: Option<&str>) -> Result<IdSpec, IdSpecError> {
    let spec = match spec {
        None => return Ok(IdSpec::ServerListing),
        Some(text) if text.trim().is_empty() => return Ok(IdSpec::ServerListing),
        Some(text) => text.trim(),
    };

    if is_numeric(spec) {
        return Ok(IdSpec::Explicit(vec![spec.to_string()]));
    }

    let path = Path::new(spec);
    if path.is_file() {
        return read_id_file(path);
    }

    let mut ids = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if is_numeric(token) {
            ids.push(token.to_string());
        } else if let Some(range) = expand_range(token) {
            ids.extend(range);
        } else {
            return Err(IdSpecError::Invalid(token.to_string()));
        }
    }
    if ids.is_empty() {
        return Err(IdSpecError::Invalid(spec.to_string()));
    }
    Ok(IdSpec::Explicit(ids))
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Expands `A-B` into the individual identifiers A, A+1, ..., B.
///
/// The range is inclusive of both ends: `1-100` means 1 through 100, not 99.
/// Endpoints given out of order are swapped rather than rejected.
fn expand_range(token: &str) -> Option<Vec<String>> {
    let (left, right) = token.split_once('-')?;
    let a: u64 = left.trim().parse().ok()?;
    let b: u64 = right.trim().parse().ok()?;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Some((lo..=hi).map(|n| n.to_string()).collect())
}

fn read_id_file(path: &Path) -> Result<IdSpec, IdSpecError> {
    let content = fs::read_to_string(path).map_err(|source| IdSpecError::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    // Files saved on Windows may begin with a byte-order marker.
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let ids: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    log::debug!("read {} identifiers from {}", ids.len(), path.display());
    Ok(IdSpec::Explicit(ids))
}
