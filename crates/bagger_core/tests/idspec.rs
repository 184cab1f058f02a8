use std::io::Write;
use std::sync::Once;

use bagger_core::{resolve_id_spec, IdSpec, IdSpecError};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bagger_logging::initialize_for_tests);
}

fn explicit(spec: &str) -> Vec<String> {
    match resolve_id_spec(Some(spec)).unwrap() {
        IdSpec::Explicit(ids) => ids,
        IdSpec::ServerListing => panic!("expected explicit ids for {spec:?}"),
    }
}

#[test]
fn single_integer_becomes_one_element_list() {
    init_logging();
    assert_eq!(explicit("54602"), vec!["54602"]);
}

#[test]
fn range_is_inclusive_of_both_ends() {
    init_logging();
    assert_eq!(explicit("1-5"), vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn reversed_range_endpoints_are_swapped() {
    init_logging();
    assert_eq!(explicit("5-1"), vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn comma_list_mixes_ids_and_ranges_in_order() {
    init_logging();
    assert_eq!(
        explicit("7,10-12,3"),
        vec!["7", "10", "11", "12", "3"]
    );
}

#[test]
fn duplicates_are_preserved_as_given() {
    init_logging();
    assert_eq!(explicit("4,4"), vec!["4", "4"]);
}

#[test]
fn missing_spec_means_server_listing() {
    init_logging();
    assert_eq!(resolve_id_spec(None).unwrap(), IdSpec::ServerListing);
    assert_eq!(resolve_id_spec(Some("  ")).unwrap(), IdSpec::ServerListing);
}

#[test]
fn unparseable_token_is_rejected() {
    init_logging();
    let err = resolve_id_spec(Some("12,no-such-file.txt")).unwrap_err();
    assert!(matches!(err, IdSpecError::Invalid(_)));
}

#[test]
fn id_file_is_read_line_by_line_with_bom_stripped() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "\u{feff}101\n  102 \n\n103\n").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    assert_eq!(explicit(&path), vec!["101", "102", "103"]);
}
