use std::fs;
use std::sync::Once;

use bagger_engine::{make_bag, Bag, BagError, BagInfo, DEFAULT_ALGORITHMS};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bagger_logging::initialize_for_tests);
}

fn sample_info() -> BagInfo {
    BagInfo {
        internal_sender_identifier: "430".to_string(),
        external_identifier: "https://doi.example.org/10.1234/xyz".to_string(),
        external_description: "Archive of record 430".to_string(),
    }
}

fn populated_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("430.xml"), "<eprint/>").unwrap();
    fs::write(temp.path().join("paper.pdf"), "pdf bytes").unwrap();
    fs::create_dir(temp.path().join("extras")).unwrap();
    fs::write(temp.path().join("extras/notes.txt"), "notes").unwrap();
    temp
}

#[test]
fn bag_restructures_payload_under_data() {
    init_logging();
    let temp = populated_dir();
    make_bag(temp.path(), &DEFAULT_ALGORITHMS, &sample_info()).unwrap();

    assert!(temp.path().join("data/430.xml").is_file());
    assert!(temp.path().join("data/paper.pdf").is_file());
    assert!(temp.path().join("data/extras/notes.txt").is_file());
    assert!(!temp.path().join("paper.pdf").exists());

    let bagit = fs::read_to_string(temp.path().join("bagit.txt")).unwrap();
    assert!(bagit.contains("BagIt-Version: 0.97"));

    for algorithm in ["sha256", "sha512", "md5"] {
        assert!(temp.path().join(format!("manifest-{algorithm}.txt")).is_file());
        assert!(temp
            .path()
            .join(format!("tagmanifest-{algorithm}.txt"))
            .is_file());
    }
}

#[test]
fn bag_info_carries_the_descriptive_fields() {
    init_logging();
    let temp = populated_dir();
    make_bag(temp.path(), &DEFAULT_ALGORITHMS, &sample_info()).unwrap();

    let info = fs::read_to_string(temp.path().join("bag-info.txt")).unwrap();
    assert!(info.contains("Internal-Sender-Identifier: 430"));
    assert!(info.contains("External-Identifier: https://doi.example.org/10.1234/xyz"));
    assert!(info.contains("External-Description: Archive of record 430"));
    // Three payload files; byte count covers all of them.
    assert!(info.contains(&format!("Payload-Oxum: {}.3", 9 + 9 + 5)));
}

#[test]
fn manifest_lines_are_sorted_with_forward_slash_paths() {
    init_logging();
    let temp = populated_dir();
    make_bag(temp.path(), &DEFAULT_ALGORITHMS, &sample_info()).unwrap();

    let manifest = fs::read_to_string(temp.path().join("manifest-sha256.txt")).unwrap();
    assert_eq!(
        manifest,
        "f1e3387a4c79337b8821b5184e5e8fb5e0f5cf17beff454338337b3ebb306b0a  data/430.xml\n\
         ab5aa97074c454a0632057e704220d9a6678fbf773a0a5806fc09b8173b07309  data/extras/notes.txt\n\
         d1cb546b102fab8362de413fdacc187b05be10df72b72db3b3e50b4953f6a555  data/paper.pdf\n"
    );
}

#[test]
fn freshly_built_bag_validates() {
    init_logging();
    let temp = populated_dir();
    let bag = make_bag(temp.path(), &DEFAULT_ALGORITHMS, &sample_info()).unwrap();
    bag.validate().unwrap();
}

#[test]
fn mutated_payload_fails_validation() {
    init_logging();
    let temp = populated_dir();
    let bag = make_bag(temp.path(), &DEFAULT_ALGORITHMS, &sample_info()).unwrap();
    fs::write(temp.path().join("data/paper.pdf"), "tampered").unwrap();

    let err = bag.validate().unwrap_err();
    assert!(matches!(err, BagError::Integrity { .. }));
}

#[test]
fn removed_payload_fails_validation() {
    init_logging();
    let temp = populated_dir();
    let bag = make_bag(temp.path(), &DEFAULT_ALGORITHMS, &sample_info()).unwrap();
    fs::remove_file(temp.path().join("data/paper.pdf")).unwrap();

    let err = bag.validate().unwrap_err();
    assert!(matches!(err, BagError::MissingFile(_)));
}

#[test]
fn bag_loaded_from_disk_can_be_validated_independently() {
    init_logging();
    let temp = populated_dir();
    make_bag(temp.path(), &DEFAULT_ALGORITHMS, &sample_info()).unwrap();

    let reopened = Bag::open(temp.path(), &DEFAULT_ALGORITHMS).unwrap();
    reopened.validate().unwrap();
}

#[test]
fn opening_a_plain_directory_is_rejected() {
    init_logging();
    let temp = populated_dir();
    let err = Bag::open(temp.path(), &DEFAULT_ALGORITHMS).unwrap_err();
    assert!(matches!(err, BagError::NotABag(_)));
}
