use std::sync::Once;

use bagger_core::{RecordFilter, RunSummary, StatusFilter, SUMMARY_LIST_CAP};
use chrono::{TimeZone, Utc};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bagger_logging::initialize_for_tests);
}

#[test]
fn status_filter_matches_case_insensitively() {
    init_logging();
    let filter = StatusFilter::parse("Archive,buried");
    assert!(filter.keeps("archive"));
    assert!(filter.keeps("BURIED"));
    assert!(!filter.keeps("deletion"));
}

#[test]
fn leading_caret_negates_the_match() {
    init_logging();
    let filter = StatusFilter::parse("^deleted");
    assert!(filter.keeps("archive"));
    assert!(!filter.keeps("Deleted"));
}

#[test]
fn lastmod_threshold_keeps_records_at_or_after_it() {
    init_logging();
    let threshold = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
    let filter = RecordFilter {
        lastmod_after: Some(threshold),
        status: None,
    };
    let before = Utc.with_ymd_and_hms(2020, 5, 31, 23, 59, 59).unwrap();
    let after = Utc.with_ymd_and_hms(2020, 6, 2, 0, 0, 0).unwrap();

    assert!(!filter.keeps(Some(before), "archive"));
    assert!(filter.keeps(Some(threshold), "archive"));
    assert!(filter.keeps(Some(after), "archive"));
    // Undated records are kept rather than silently dropped.
    assert!(filter.keeps(None, "archive"));
}

#[test]
fn summary_caps_excessive_identifier_lists() {
    init_logging();
    let mut summary = RunSummary::new();
    for n in 0..(SUMMARY_LIST_CAP + 1) {
        summary.record_missing(&n.to_string());
    }
    summary.record_done();

    let lines = summary.report_lines();
    assert!(lines[0].contains("1 record"));
    assert!(lines
        .iter()
        .any(|line| line.starts_with("More than 500 records")));
}

#[test]
fn summary_lists_short_tallies_verbatim() {
    init_logging();
    let mut summary = RunSummary::new();
    summary.record_missing("11");
    summary.record_skipped("8");

    let lines = summary.report_lines();
    assert!(lines.iter().any(|line| line.contains("skipped") && line.contains('8')));
    assert!(lines.iter().any(|line| line.contains("not found") && line.contains("11")));
}
