use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("source directory has no usable name: {0}")]
    BadSource(PathBuf),
    #[error("failed to verify file \"{0}\"")]
    Corrupted(String),
}

/// Single-file serialization formats for a package directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// ZIP without compression.
    ZipStored,
    /// ZIP with deflate compression.
    ZipDeflated,
    /// Plain uncompressed TAR.
    Tar,
    /// Gzip-compressed TAR.
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::ZipStored | ArchiveFormat::ZipDeflated => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

/// Serializes `source_dir` into a single archive file next to it, named
/// `{dirname}.{ext}`, with the directory name as the archive root.
///
/// `comment` is embedded as an archive-level comment where the format
/// supports one (ZIP does; TAR has no such concept and it is omitted
/// silently).
pub fn write_archive(
    source_dir: &Path,
    format: ArchiveFormat,
    comment: &str,
) -> Result<PathBuf, ArchiveError> {
    let root_name = source_dir
        .file_name()
        .ok_or_else(|| ArchiveError::BadSource(source_dir.to_path_buf()))?
        .to_string_lossy()
        .to_string();
    let destination = source_dir.with_file_name(format!("{root_name}.{}", format.extension()));

    let mut members = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .map_err(io::Error::other)?;
            let name = std::iter::once(root_name.as_str())
                .chain(relative.components().map(|c| {
                    c.as_os_str().to_str().unwrap_or_default()
                }))
                .collect::<Vec<_>>()
                .join("/");
            members.push((entry.into_path(), name));
        }
    }

    match format {
        ArchiveFormat::ZipStored | ArchiveFormat::ZipDeflated => {
            write_zip(&destination, &members, format, comment)?;
        }
        ArchiveFormat::Tar => {
            let file = File::create(&destination)?;
            write_tar(file, &members)?;
        }
        ArchiveFormat::TarGz => {
            let file = File::create(&destination)?;
            let encoder = GzEncoder::new(file, Compression::default());
            let encoder = write_tar(encoder, &members)?;
            encoder.finish()?;
        }
    }
    Ok(destination)
}

fn write_zip(
    destination: &Path,
    members: &[(PathBuf, String)],
    format: ArchiveFormat,
    comment: &str,
) -> Result<(), ArchiveError> {
    let method = match format {
        ArchiveFormat::ZipDeflated => CompressionMethod::Deflated,
        _ => CompressionMethod::Stored,
    };
    let options = SimpleFileOptions::default().compression_method(method);

    let mut writer = ZipWriter::new(File::create(destination)?);
    writer.set_comment(comment);
    for (path, name) in members {
        writer.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut writer)?;
    }
    writer.finish()?;
    Ok(())
}

fn write_tar<W: Write>(writer: W, members: &[(PathBuf, String)]) -> Result<W, ArchiveError> {
    let mut builder = tar::Builder::new(writer);
    for (path, name) in members {
        builder.append_path_with_name(path, name)?;
    }
    Ok(builder.into_inner()?)
}

/// Format-native corruption check, independent of the checksum manifests.
///
/// For ZIP this exercises the per-entry CRC by reading every entry to the
/// end; for TAR every member's content is read fully. Any read failure
/// means the archive is unusable.
pub fn verify_archive(path: &Path, format: ArchiveFormat) -> Result<(), ArchiveError> {
    let result = match format {
        ArchiveFormat::ZipStored | ArchiveFormat::ZipDeflated => verify_zip(path),
        ArchiveFormat::Tar | ArchiveFormat::TarGz => verify_tar(path, format),
    };
    result.map_err(|err| {
        log::debug!("archive verification failed for {}: {err}", path.display());
        ArchiveError::Corrupted(path.display().to_string())
    })
}

fn verify_zip(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        io::copy(&mut entry, &mut io::sink())?;
    }
    Ok(())
}

fn verify_tar(path: &Path, format: ArchiveFormat) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        io::copy(&mut entry, &mut io::sink())?;
    }
    Ok(())
}

/// Archives `source_dir`, verifies the result, and only then deletes the
/// source directory. Deletion is deliberate and irreversible: the archive
/// becomes the single deliverable, reclaiming the directory's disk space.
pub fn archive_and_remove(
    source_dir: &Path,
    format: ArchiveFormat,
    comment: &str,
) -> Result<PathBuf, ArchiveError> {
    let archive_path = write_archive(source_dir, format, comment)?;
    verify_archive(&archive_path, format)?;
    fs::remove_dir_all(source_dir)?;
    Ok(archive_path)
}
