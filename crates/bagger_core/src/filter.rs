use chrono::{DateTime, Utc};

/// Case-insensitive allow/deny list over record status labels.
///
/// A leading `^` inverts the match, so `^deleted,buried` keeps every record
/// whose status is neither "deleted" nor "buried".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter {
    labels: Vec<String>,
    negated: bool,
}

impl StatusFilter {
    pub fn parse(text: &str) -> Self {
        let (negated, rest) = match text.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let labels = rest
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        Self { labels, negated }
    }

    pub fn keeps(&self, status: &str) -> bool {
        let matched = self
            .labels
            .iter()
            .any(|label| label.eq_ignore_ascii_case(status.trim()));
        if self.negated {
            !matched
        } else {
            matched
        }
    }
}

/// Record filters applied between fetching and writing a record.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Keep only records modified at or after this instant.
    pub lastmod_after: Option<DateTime<Utc>>,
    /// Keep only records whose status passes this filter.
    pub status: Option<StatusFilter>,
}

impl RecordFilter {
    /// Whether a record with the given modification time and status label
    /// should be processed.
    ///
    /// A record carrying no modification timestamp is kept even when a
    /// threshold is set; the filter is for incremental harvesting and
    /// dropping undated records would silently lose content.
    pub fn keeps(&self, lastmod: Option<DateTime<Utc>>, status: &str) -> bool {
        if let (Some(threshold), Some(modified)) = (self.lastmod_after, lastmod) {
            if modified < threshold {
                return false;
            }
        }
        if let Some(filter) = &self.status {
            if !filter.keeps(status) {
                return false;
            }
        }
        true
    }
}
