use std::fs;
use std::path::Path;
use std::sync::Once;

use bagger_engine::{
    archive_and_remove, verify_archive, write_archive, ArchiveError, ArchiveFormat,
};
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bagger_logging::initialize_for_tests);
}

const ALL_FORMATS: [ArchiveFormat; 4] = [
    ArchiveFormat::ZipStored,
    ArchiveFormat::ZipDeflated,
    ArchiveFormat::Tar,
    ArchiveFormat::TarGz,
];

fn populated_dir(parent: &Path) -> std::path::PathBuf {
    let dir = parent.join("430");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("430.xml"), "<eprint/>").unwrap();
    fs::create_dir(dir.join("data")).unwrap();
    fs::write(dir.join("data/paper.pdf"), "pdf bytes".repeat(100)).unwrap();
    dir
}

#[test]
fn round_trip_verifies_for_every_format() {
    init_logging();
    for format in ALL_FORMATS {
        let temp = TempDir::new().unwrap();
        let dir = populated_dir(temp.path());

        let archive = write_archive(&dir, format, "test archive").unwrap();
        assert!(archive
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with(format.extension()));
        verify_archive(&archive, format).unwrap();
    }
}

#[test]
fn zip_archives_embed_the_comment() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = populated_dir(temp.path());

    let archive = write_archive(&dir, ArchiveFormat::ZipDeflated, "a descriptive note").unwrap();
    let zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
    assert_eq!(zip.comment(), b"a descriptive note");
}

#[test]
fn archive_root_is_the_directory_name() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = populated_dir(temp.path());

    let archive = write_archive(&dir, ArchiveFormat::ZipStored, "").unwrap();
    let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.iter().all(|name| name.starts_with("430/")));
    assert!(names.contains(&"430/data/paper.pdf".to_string()));
}

#[test]
fn truncated_tarball_fails_verification() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = populated_dir(temp.path());

    let archive = write_archive(&dir, ArchiveFormat::TarGz, "").unwrap();
    let bytes = fs::read(&archive).unwrap();
    fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

    let err = verify_archive(&archive, ArchiveFormat::TarGz).unwrap_err();
    assert!(matches!(err, ArchiveError::Corrupted(_)));
}

#[test]
fn source_directory_is_removed_only_after_verification() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = populated_dir(temp.path());

    let archive = archive_and_remove(&dir, ArchiveFormat::TarGz, "").unwrap();
    assert!(archive.is_file());
    assert!(!dir.exists());
}
