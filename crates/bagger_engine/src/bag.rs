use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::Md5;
use rayon::prelude::*;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use walkdir::WalkDir;

/// Version marker written into bagit.txt.
pub const BAGIT_VERSION: &str = "0.97";

/// Digest algorithms used by default: one 256-bit, one 512-bit and the
/// legacy 128-bit digest, for interoperability with downstream verifiers.
pub const DEFAULT_ALGORITHMS: [ChecksumAlgorithm; 3] = [
    ChecksumAlgorithm::Sha256,
    ChecksumAlgorithm::Sha512,
    ChecksumAlgorithm::Md5,
];

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum BagError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("checksum mismatch for {path} ({algorithm})")]
    Integrity {
        path: String,
        algorithm: &'static str,
    },
    #[error("file listed in manifest is missing: {0}")]
    MissingFile(String),
    #[error("not a bag: missing {0}")]
    NotABag(String),
    #[error("malformed manifest line in {manifest}: {line}")]
    MalformedManifest { manifest: String, line: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
    Md5,
}

impl ChecksumAlgorithm {
    pub fn label(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
            ChecksumAlgorithm::Md5 => "md5",
        }
    }
}

enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
    Md5(Md5),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
            ChecksumAlgorithm::Md5 => Hasher::Md5(Md5::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(chunk),
            Hasher::Sha512(h) => h.update(chunk),
            Hasher::Md5(h) => h.update(chunk),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
            Hasher::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Digests one file under every requested algorithm in a single read pass.
fn digest_file(
    path: &Path,
    algorithms: &[ChecksumAlgorithm],
) -> Result<Vec<(ChecksumAlgorithm, String)>, BagError> {
    let mut file = File::open(path)?;
    let mut hashers: Vec<(ChecksumAlgorithm, Hasher)> = algorithms
        .iter()
        .map(|&alg| (alg, Hasher::new(alg)))
        .collect();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buffer[..read]);
        }
    }
    Ok(hashers
        .into_iter()
        .map(|(alg, hasher)| (alg, hasher.finish()))
        .collect())
}

/// Digest a set of files, distributing the work across a small thread pool.
///
/// Pool size is a fraction of the available cores, and collapses to inline
/// computation when there are fewer files than workers; typical per-record
/// directories are small and pool creation would dominate.
fn digest_files(
    files: &[PathBuf],
    algorithms: &[ChecksumAlgorithm],
) -> Result<Vec<(PathBuf, Vec<(ChecksumAlgorithm, String)>)>, BagError> {
    let workers = digest_workers(files.len());
    if workers <= 1 {
        return files
            .iter()
            .map(|path| Ok((path.clone(), digest_file(path, algorithms)?)))
            .collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| BagError::Io(io::Error::other(err)))?;
    pool.install(|| {
        files
            .par_iter()
            .map(|path| Ok((path.clone(), digest_file(path, algorithms)?)))
            .collect()
    })
}

fn digest_workers(file_count: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / 2).clamp(1, file_count.max(1))
}

/// Descriptive metadata recorded in bag-info.txt.
#[derive(Debug, Clone, Default)]
pub struct BagInfo {
    pub internal_sender_identifier: String,
    /// The record's official URL, its id, or empty when neither exists.
    pub external_identifier: String,
    pub external_description: String,
}

/// A directory restructured into checksum-manifested preservation layout.
#[derive(Debug)]
pub struct Bag {
    root: PathBuf,
    algorithms: Vec<ChecksumAlgorithm>,
}

/// Restructures `dir` in place into a bag.
///
/// The original payload moves under `data/`; alongside it appear
/// `bagit.txt`, `bag-info.txt`, one `manifest-<alg>.txt` per algorithm and
/// matching `tagmanifest-<alg>.txt` files.
pub fn make_bag(
    dir: &Path,
    algorithms: &[ChecksumAlgorithm],
    info: &BagInfo,
) -> Result<Bag, BagError> {
    // Collect the payload entries before creating data/ so the new
    // directory is not moved into itself.
    let entries: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();

    let data_dir = dir.join("data");
    fs::create_dir(&data_dir)?;
    for entry in &entries {
        let name = entry
            .file_name()
            .ok_or_else(|| BagError::Io(io::Error::other("payload entry has no name")))?;
        fs::rename(entry, data_dir.join(name))?;
    }

    let payload = regular_files_under(&data_dir);
    let digests = digest_files(&payload, algorithms)?;

    let mut octets = 0u64;
    for path in &payload {
        octets += fs::metadata(path)?.len();
    }

    for &algorithm in algorithms {
        fs::write(
            dir.join(format!("manifest-{}.txt", algorithm.label())),
            manifest_content(&digests, algorithm, dir),
        )?;
    }

    fs::write(
        dir.join("bagit.txt"),
        format!("BagIt-Version: {BAGIT_VERSION}\nTag-File-Character-Encoding: UTF-8\n"),
    )?;

    let bagging_date = chrono::Utc::now().format("%Y-%m-%d");
    let software_agent = format!(
        "{} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    fs::write(
        dir.join("bag-info.txt"),
        format!(
            "Bag-Software-Agent: {software_agent}\n\
             Bagging-Date: {bagging_date}\n\
             External-Description: {}\n\
             External-Identifier: {}\n\
             Internal-Sender-Identifier: {}\n\
             Payload-Oxum: {octets}.{}\n",
            info.external_description,
            info.external_identifier,
            info.internal_sender_identifier,
            payload.len(),
        ),
    )?;

    // Tag manifests cover the tag files just written, not the payload.
    let mut tag_files = vec![dir.join("bagit.txt"), dir.join("bag-info.txt")];
    for &algorithm in algorithms {
        tag_files.push(dir.join(format!("manifest-{}.txt", algorithm.label())));
    }
    let tag_digests = digest_files(&tag_files, algorithms)?;
    for &algorithm in algorithms {
        fs::write(
            dir.join(format!("tagmanifest-{}.txt", algorithm.label())),
            manifest_content(&tag_digests, algorithm, dir),
        )?;
    }

    Ok(Bag {
        root: dir.to_path_buf(),
        algorithms: algorithms.to_vec(),
    })
}

impl Bag {
    /// Opens an existing bag directory for validation.
    pub fn open(root: &Path, algorithms: &[ChecksumAlgorithm]) -> Result<Self, BagError> {
        if !root.join("bagit.txt").is_file() {
            return Err(BagError::NotABag("bagit.txt".to_string()));
        }
        for &algorithm in algorithms {
            let manifest = format!("manifest-{}.txt", algorithm.label());
            if !root.join(&manifest).is_file() {
                return Err(BagError::NotABag(manifest));
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            algorithms: algorithms.to_vec(),
        })
    }

    /// Recomputes every digest in every manifest and tag manifest, failing
    /// on the first mismatch or missing file.
    pub fn validate(&self) -> Result<(), BagError> {
        for &algorithm in &self.algorithms {
            self.validate_manifest(
                &format!("manifest-{}.txt", algorithm.label()),
                algorithm,
            )?;
            self.validate_manifest(
                &format!("tagmanifest-{}.txt", algorithm.label()),
                algorithm,
            )?;
        }
        Ok(())
    }

    fn validate_manifest(
        &self,
        manifest_name: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Result<(), BagError> {
        let manifest_path = self.root.join(manifest_name);
        if !manifest_path.is_file() {
            return Err(BagError::NotABag(manifest_name.to_string()));
        }
        let content = fs::read_to_string(&manifest_path)?;
        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (expected, rel_path) =
                line.split_once("  ")
                    .ok_or_else(|| BagError::MalformedManifest {
                        manifest: manifest_name.to_string(),
                        line: line.to_string(),
                    })?;
            let file_path = self.root.join(rel_path);
            if !file_path.is_file() {
                return Err(BagError::MissingFile(rel_path.to_string()));
            }
            let digests = digest_file(&file_path, &[algorithm])?;
            let actual = digest_for(&digests, algorithm);
            if actual != expected {
                log::debug!(
                    "digest mismatch for {rel_path}: expected {expected}, computed {actual}"
                );
                return Err(BagError::Integrity {
                    path: rel_path.to_string(),
                    algorithm: algorithm.label(),
                });
            }
        }
        Ok(())
    }
}

/// Formats manifest lines as `{digest}  {path}`, sorted by relative path.
fn manifest_content(
    digests: &[(PathBuf, Vec<(ChecksumAlgorithm, String)>)],
    algorithm: ChecksumAlgorithm,
    root: &Path,
) -> String {
    let mut entries: Vec<(String, &str)> = digests
        .iter()
        .map(|(path, file_digests)| {
            (
                relative_slash_path(path, root),
                digest_for(file_digests, algorithm),
            )
        })
        .collect();
    entries.sort();
    let mut content = String::new();
    for (path, digest) in entries {
        content.push_str(&format!("{digest}  {path}\n"));
    }
    content
}

fn digest_for(digests: &[(ChecksumAlgorithm, String)], algorithm: ChecksumAlgorithm) -> &str {
    digests
        .iter()
        .find(|(alg, _)| *alg == algorithm)
        .map(|(_, digest)| digest.as_str())
        .unwrap_or("")
}

fn regular_files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn relative_slash_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
