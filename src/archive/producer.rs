use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::types::{ArchiveOptions, ArchiveSummary};
use crate::archive::writer::{ArchiveSink, ChunkWriter};
use crate::tree::TreeWalker;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::Stream;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Serializes a directory tree into a `.tar.gz` archive.
///
/// Entry policy is best-effort: symlinks are skipped, and files that cannot
/// be opened (permissions, deleted mid-walk) are logged and left out.
#[derive(Debug, Clone, Default)]
pub struct ArchiveProducer {
    options: ArchiveOptions,
}

impl ArchiveProducer {
    pub fn new(options: ArchiveOptions) -> Self {
        Self { options }
    }

    /// Start archiving `root` on a blocking thread and return the chunk
    /// stream it feeds.
    ///
    /// Must be called from within a Tokio runtime. Dropping the stream makes
    /// the producer fail its next chunk hand-off, abort, and release every
    /// handle it holds.
    pub fn stream(&self, root: PathBuf) -> ArchiveResult<ArchiveStream> {
        if !root.is_dir() {
            return Err(ArchiveError::SourceNotFound(root));
        }

        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let options = self.options.clone();

        let producer = tokio::task::spawn_blocking(move || {
            let error_tx = tx.clone();
            let writer = ChunkWriter::new(tx, options.chunk_size);

            let result = build_archive(&root, writer, options.compression_level).and_then(
                |(mut writer, mut summary)| {
                    writer.finish().map_err(|e| sink_error(&writer, e))?;
                    summary.bytes = writer.bytes_sent();
                    Ok(summary)
                },
            );

            match &result {
                Ok(summary) => {
                    crate::metrics::record_archive_streamed(summary.bytes);
                    tracing::debug!(
                        root = %root.display(),
                        entries = summary.entries,
                        skipped = summary.skipped,
                        bytes = summary.bytes,
                        "archive stream complete"
                    );
                }
                Err(ArchiveError::StreamAborted { bytes_sent }) => {
                    crate::metrics::record_stream_aborted(*bytes_sent);
                    tracing::info!(
                        root = %root.display(),
                        bytes_sent,
                        "archive consumer disconnected, producer stopped"
                    );
                }
                Err(e) => {
                    tracing::error!(root = %root.display(), error = %e, "archive stream failed");
                    let _ = error_tx.blocking_send(Err(ArchiveError::ProducerFailed(e.to_string())));
                }
            }

            result
        });

        Ok(ArchiveStream { rx, producer })
    }

    /// Archive `root` into `dest`, which must not exist yet.
    ///
    /// Blocking. Output goes to a temporary file beside `dest` that is only
    /// renamed into place once complete, so a failure never leaves a partial
    /// archive behind.
    pub fn write_to_file(&self, root: &Path, dest: &Path) -> ArchiveResult<ArchiveSummary> {
        if !root.is_dir() {
            return Err(ArchiveError::SourceNotFound(root.to_path_buf()));
        }
        if dest.exists() {
            return Err(ArchiveError::DestinationExists(dest.to_path_buf()));
        }

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let temp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".tmp")
            .tempfile_in(parent)?;

        let (sink, mut summary) = build_archive(
            root,
            BufWriter::new(temp),
            self.options.compression_level,
        )?;
        let temp = sink.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        summary.bytes = temp.as_file().metadata()?.len();

        temp.persist_noclobber(dest).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                ArchiveError::DestinationExists(dest.to_path_buf())
            } else {
                ArchiveError::Io(e.error)
            }
        })?;

        tracing::debug!(
            root = %root.display(),
            dest = %dest.display(),
            entries = summary.entries,
            bytes = summary.bytes,
            "archive written"
        );
        Ok(summary)
    }

    /// Run [`ArchiveProducer::write_to_file`] on the blocking pool
    pub async fn write_to_file_async(
        &self,
        root: PathBuf,
        dest: PathBuf,
    ) -> ArchiveResult<ArchiveSummary> {
        let producer = self.clone();
        tokio::task::spawn_blocking(move || producer.write_to_file(&root, &dest))
            .await
            .map_err(|e| ArchiveError::TaskFailed(e.to_string()))?
    }
}

fn sink_error<S: ArchiveSink>(sink: &S, e: io::Error) -> ArchiveError {
    match sink.disconnected() {
        Some(bytes_sent) => ArchiveError::StreamAborted { bytes_sent },
        None => ArchiveError::Io(e),
    }
}

/// Walk `root` and write every readable regular file into a gzip'd tar
/// stream over `sink`. Returns the sink once the gzip trailer is written.
fn build_archive<S: ArchiveSink>(
    root: &Path,
    sink: S,
    compression_level: u32,
) -> ArchiveResult<(S, ArchiveSummary)> {
    let encoder = GzEncoder::new(sink, Compression::new(compression_level));
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut summary = ArchiveSummary::default();
    let mut walker = TreeWalker::new(root);

    for entry in walker.by_ref() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                summary.skipped += 1;
                tracing::warn!(root = %root.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        let mut file = match File::open(&entry.path) {
            Ok(file) => file,
            Err(e) => {
                summary.skipped += 1;
                tracing::warn!(path = %entry.path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        // Past this point a read failure has already emitted a header, so
        // the archive cannot be salvaged
        let name = entry.key.trim_start_matches('/');
        if let Err(e) = builder.append_file(name, &mut file) {
            return Err(sink_error(builder.get_ref().get_ref(), e));
        }
        summary.entries += 1;
    }
    summary.skipped_symlinks = walker.skipped_symlinks();

    builder.finish().map_err(|e| sink_error(builder.get_ref().get_ref(), e))?;
    let mut encoder = builder.into_inner()?;
    encoder
        .try_finish()
        .map_err(|e| sink_error(encoder.get_ref(), e))?;
    let sink = encoder.finish()?;

    Ok((sink, summary))
}

/// One-shot stream of archive chunks, delivered in production order
#[derive(Debug)]
pub struct ArchiveStream {
    rx: mpsc::Receiver<ArchiveResult<Bytes>>,
    producer: JoinHandle<ArchiveResult<ArchiveSummary>>,
}

impl ArchiveStream {
    pub async fn next_chunk(&mut self) -> Option<ArchiveResult<Bytes>> {
        self.rx.recv().await
    }

    /// Stop consuming. Returns the producer so callers can wait for it to
    /// wind down.
    pub fn cancel(self) -> JoinHandle<ArchiveResult<ArchiveSummary>> {
        drop(self.rx);
        self.producer
    }

    /// Drain the whole stream into memory
    pub async fn collect_bytes(mut self) -> ArchiveResult<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for ArchiveStream {
    type Item = ArchiveResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveExtractor;
    use crate::integrity::HashScanner;
    use futures::StreamExt;
    use rand::RngCore;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("slot1/autosave")).unwrap();
        fs::write(root.join("config.ini"), b"difficulty=hard").unwrap();
        fs::write(root.join("slot1/main.sav"), vec![7u8; 300_000]).unwrap();
        fs::write(root.join("slot1/autosave/auto.sav"), b"checkpoint").unwrap();
    }

    fn random_file(path: &Path, len: usize) {
        let mut data = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut data);
        fs::write(path, data).unwrap();
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        populate(&source);

        let producer = ArchiveProducer::default();
        let bytes = producer.stream(source.clone()).unwrap().collect_bytes().await.unwrap();

        let archive = temp.path().join("out.tar.gz");
        fs::write(&archive, &bytes).unwrap();
        let restored = temp.path().join("restored");
        ArchiveExtractor::extract(&archive, &restored).unwrap();

        let scanner = HashScanner::default();
        assert_eq!(scanner.scan(&source).unwrap(), scanner.scan(&restored).unwrap());
    }

    #[tokio::test]
    async fn test_stream_chunks_have_fixed_size() {
        let temp = TempDir::new().unwrap();
        random_file(&temp.path().join("noise.bin"), 200_000);

        let producer = ArchiveProducer::new(ArchiveOptions::default().with_chunk_size(16 * 1024));
        let chunks: Vec<Bytes> = producer
            .stream(temp.path().to_path_buf())
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert!(chunks.len() > 1);
        let (last, full) = chunks.split_last().unwrap();
        assert!(full.iter().all(|chunk| chunk.len() == 16 * 1024));
        assert!(!last.is_empty() && last.len() <= 16 * 1024);
    }

    #[tokio::test]
    async fn test_stream_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = ArchiveProducer::default().stream(temp.path().join("absent"));
        assert!(matches!(result, Err(ArchiveError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_early_disconnect_stops_producer() {
        let temp = TempDir::new().unwrap();
        for i in 0..4 {
            random_file(&temp.path().join(format!("blob{i}.bin")), 1024 * 1024);
        }

        let producer = ArchiveProducer::default();
        let mut stream = producer.stream(temp.path().to_path_buf()).unwrap();

        for _ in 0..2 {
            stream.next_chunk().await.unwrap().unwrap();
        }

        let handle = stream.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("producer did not stop after disconnect")
            .unwrap();

        match outcome {
            Err(ArchiveError::StreamAborted { bytes_sent }) => {
                assert!(bytes_sent >= 2 * 64 * 1024);
                assert!(bytes_sent < 4 * 1024 * 1024);
            }
            other => panic!("expected StreamAborted, got {other:?}"),
        }
    }

    #[test]
    fn test_write_to_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        populate(&source);
        let dest = temp.path().join("backups/2025-01-02_03-04-05.tar.gz");

        let summary = ArchiveProducer::default().write_to_file(&source, &dest).unwrap();

        assert_eq!(summary.entries, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.bytes, fs::metadata(&dest).unwrap().len());

        // Only the finished archive remains in the directory
        let names: Vec<_> = fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_write_to_file_refuses_existing_destination() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        populate(&source);
        let dest = temp.path().join("taken.tar.gz");
        fs::write(&dest, b"existing").unwrap();

        let result = ArchiveProducer::default().write_to_file(&source, &dest);

        assert!(matches!(result, Err(ArchiveError::DestinationExists(_))));
        assert_eq!(fs::read(&dest).unwrap(), b"existing");
    }

    #[test]
    fn test_empty_tree_produces_valid_archive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("empty");
        fs::create_dir_all(&source).unwrap();
        let dest = temp.path().join("empty.tar.gz");

        let summary = ArchiveProducer::default().write_to_file(&source, &dest).unwrap();
        assert_eq!(summary.entries, 0);

        let restored = temp.path().join("restored");
        let extracted = ArchiveExtractor::extract(&dest, &restored).unwrap();
        assert_eq!(extracted.files, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_and_unreadable_files_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        populate(&source);
        std::os::unix::fs::symlink(source.join("config.ini"), source.join("link.ini")).unwrap();
        let locked = source.join("locked.sav");
        fs::write(&locked, b"secret").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let locked_readable = File::open(&locked).is_ok();

        let dest = temp.path().join("out.tar.gz");
        let summary = ArchiveProducer::default().write_to_file(&source, &dest).unwrap();

        assert_eq!(summary.skipped_symlinks, 1);
        if !locked_readable {
            assert_eq!(summary.entries, 3);
            assert_eq!(summary.skipped, 1);
        }

        let restored = temp.path().join("restored");
        ArchiveExtractor::extract(&dest, &restored).unwrap();
        assert!(!restored.join("link.ini").exists());
        assert!(restored.join("slot1/main.sav").exists());
    }
}
