/// Identifier lists longer than this are reported as a count only.
pub const SUMMARY_LIST_CAP: usize = 500;

/// Running tallies accumulated across one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records fetched, populated and packaged successfully.
    pub processed: usize,
    /// Identifiers rejected by the lastmod/status filters.
    pub skipped: Vec<String>,
    /// Identifiers the server had no content for.
    pub missing: Vec<String>,
    /// True when the run stopped early on a user interrupt.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_done(&mut self) {
        self.processed += 1;
    }

    pub fn record_skipped(&mut self, id: &str) {
        self.skipped.push(id.to_string());
    }

    pub fn record_missing(&mut self, id: &str) {
        self.missing.push(id.to_string());
    }

    /// Human-readable closing report, with long identifier lists capped.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "Done. Wrote {} record{}.",
            self.processed,
            if self.processed == 1 { "" } else { "s" }
        ));
        if let Some(line) = list_line(&self.skipped, "skipped by the filters") {
            lines.push(line);
        }
        if let Some(line) = list_line(&self.missing, "not found on the server") {
            lines.push(line);
        }
        if self.interrupted {
            lines.push("Run was interrupted; output written so far is kept.".to_string());
        }
        lines
    }
}

fn list_line(ids: &[String], what: &str) -> Option<String> {
    if ids.is_empty() {
        None
    } else if ids.len() > SUMMARY_LIST_CAP {
        Some(format!("More than {SUMMARY_LIST_CAP} records were {what}."))
    } else {
        Some(format!(
            "The following records were {}: {}.",
            what,
            ids.join(", ")
        ))
    }
}
