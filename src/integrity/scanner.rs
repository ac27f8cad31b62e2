use crate::integrity::error::{ScanError, ScanResult};
use crate::integrity::types::{ChecksumType, FileHashMap};
use crate::tree::TreeWalker;
use sha2::Digest;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

const READ_BUFFER_SIZE: usize = 64 * 1024;

enum ContentHasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
    Md5(md5::Md5),
}

impl ContentHasher {
    fn new(checksum_type: ChecksumType) -> Self {
        match checksum_type {
            ChecksumType::Blake3 => ContentHasher::Blake3(Box::new(blake3::Hasher::new())),
            ChecksumType::Sha256 => ContentHasher::Sha256(sha2::Sha256::new()),
            ChecksumType::Md5 => ContentHasher::Md5(md5::Md5::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Blake3(hasher) => {
                hasher.update(data);
            }
            ContentHasher::Sha256(hasher) => hasher.update(data),
            ContentHasher::Md5(hasher) => hasher.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            ContentHasher::Blake3(hasher) => hasher.finalize().to_hex().to_string(),
            ContentHasher::Sha256(hasher) => hex::encode(hasher.finalize()),
            ContentHasher::Md5(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Builds a [`FileHashMap`] for a directory tree.
///
/// Scans are all-or-nothing: the first file that cannot be read fails the
/// whole scan, since a partial index would make reconciliation report
/// present files as missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashScanner {
    checksum_type: ChecksumType,
}

impl HashScanner {
    pub fn new(checksum_type: ChecksumType) -> Self {
        Self { checksum_type }
    }

    /// Hex digest of everything `reader` yields
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<String> {
        let mut hasher = ContentHasher::new(self.checksum_type);
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finalize_hex())
    }

    pub fn hash_bytes(&self, data: &[u8]) -> String {
        let mut hasher = ContentHasher::new(self.checksum_type);
        hasher.update(data);
        hasher.finalize_hex()
    }

    /// Hex digest of a file's full contents (streaming)
    pub fn hash_file(&self, path: &Path) -> ScanResult<String> {
        let read_error = |source| ScanError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_error)?;
        self.hash_reader(file).map_err(read_error)
    }

    /// Hash every regular file under `root`, creating `root` if absent.
    ///
    /// Blocking; see [`HashScanner::scan_async`] for use from async code.
    pub fn scan(&self, root: &Path) -> ScanResult<FileHashMap> {
        let started = Instant::now();

        if !root.exists() {
            std::fs::create_dir_all(root).map_err(|source| ScanError::CreateRoot {
                path: root.to_path_buf(),
                source,
            })?;
            tracing::debug!(root = %root.display(), "created missing scan root");
            return Ok(FileHashMap::new());
        }

        let mut hashes = FileHashMap::new();
        for entry in TreeWalker::new(root) {
            let entry = entry.map_err(|source| ScanError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            let digest = self.hash_file(&entry.path)?;
            hashes.insert(entry.key, digest);
        }

        crate::metrics::record_scan(hashes.len(), started.elapsed());
        tracing::debug!(
            root = %root.display(),
            files = hashes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );

        Ok(hashes)
    }

    /// Run [`HashScanner::scan`] on the blocking pool
    pub async fn scan_async(&self, root: PathBuf) -> ScanResult<FileHashMap> {
        let scanner = *self;
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| ScanError::TaskFailed(e.to_string()))?
    }
}
