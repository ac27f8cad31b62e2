use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::types::ExtractSummary;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Unpacks `.tar.gz` archives.
///
/// Extraction is additive: files already in the destination that the
/// archive does not mention are left alone. Links, device nodes and entries
/// whose path would land outside the destination are skipped.
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Blocking; see [`ArchiveExtractor::extract_async`]
    pub fn extract(archive: &Path, dest: &Path) -> ArchiveResult<ExtractSummary> {
        let file = File::open(archive).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ArchiveError::extraction(archive, "archive not found"),
            _ => ArchiveError::extraction(archive, format!("cannot open archive: {e}")),
        })?;

        std::fs::create_dir_all(dest).map_err(|e| {
            ArchiveError::extraction(
                archive,
                format!("destination {} is not writable: {e}", dest.display()),
            )
        })?;

        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.set_overwrite(true);
        tar.set_preserve_permissions(false);

        let malformed = |e: io::Error| ArchiveError::extraction(archive, format!("malformed archive: {e}"));

        let mut summary = ExtractSummary::default();
        for entry in tar.entries().map_err(malformed)? {
            let mut entry = entry.map_err(malformed)?;
            let entry_type = entry.header().entry_type();

            if !(entry_type.is_file() || entry_type.is_dir()) {
                summary.skipped += 1;
                tracing::debug!(
                    archive = %archive.display(),
                    path = %entry.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    "skipping non-regular archive entry"
                );
                continue;
            }

            let unpacked = entry.unpack_in(dest).map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => ArchiveError::extraction(
                    archive,
                    format!("destination {} is not writable: {e}", dest.display()),
                ),
                _ => malformed(e),
            })?;

            if !unpacked {
                summary.skipped += 1;
                tracing::warn!(archive = %archive.display(), "skipping archive entry outside destination");
            } else if entry_type.is_dir() {
                summary.directories += 1;
            } else {
                summary.files += 1;
            }
        }

        tracing::debug!(
            archive = %archive.display(),
            dest = %dest.display(),
            files = summary.files,
            skipped = summary.skipped,
            "archive extracted"
        );
        Ok(summary)
    }

    /// Run [`ArchiveExtractor::extract`] on the blocking pool
    pub async fn extract_async(archive: PathBuf, dest: PathBuf) -> ArchiveResult<ExtractSummary> {
        tokio::task::spawn_blocking(move || Self::extract(&archive, &dest))
            .await
            .map_err(|e| ArchiveError::TaskFailed(e.to_string()))?
    }
}
