//! Copy engine: one remote path to one local destination.
//!
//! The engine acquires a handle for the namespace, checks the source exists,
//! and then copies either a single file or a whole directory tree. Directory
//! trees are walked with an explicit stack so depth is bounded only by memory.
//!
//! Each file is streamed through an optional [`ThrottledReader`] and, when
//! checksums are enabled, a [`DigestReader`]. After the write is flushed the
//! destination is re-read and its digest compared with the digest of the
//! bytes read from the source.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::checksum::{DigestReader, sha256_file};
use super::constants::{BUFFER_SIZE, BYTES_PER_MB};
use super::error::CopyError;
use super::rate_limiter::ThrottledReader;
use crate::fs::{ByteStream, FileStatus, FileSystemProvider, FsError, RemoteFileSystem};

/// Computes the hex digest of a written destination file.
///
/// Runs on the blocking pool.
pub type LocalDigestFn = fn(&Path) -> io::Result<String>;

/// Result of copying one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyOutcome {
    /// Total bytes written to the destination.
    pub bytes_copied: u64,
    /// Whether every copied file passed digest verification.
    ///
    /// Always false when checksums are disabled or no file was copied.
    pub checksum_verified: bool,
    /// Number of regular files copied.
    pub files_copied: usize,
}

/// Copies remote paths to the local filesystem.
#[derive(Clone)]
pub struct CopyEngine {
    provider: Arc<dyn FileSystemProvider>,
    checksum_enabled: bool,
    interrupted: Arc<AtomicBool>,
    local_digest: LocalDigestFn,
}

impl fmt::Debug for CopyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyEngine")
            .field("checksum_enabled", &self.checksum_enabled)
            .finish_non_exhaustive()
    }
}

impl CopyEngine {
    /// Creates an engine drawing handles from `provider`.
    pub fn new(provider: Arc<dyn FileSystemProvider>, checksum_enabled: bool) -> Self {
        Self {
            provider,
            checksum_enabled,
            interrupted: Arc::new(AtomicBool::new(false)),
            local_digest: sha256_file,
        }
    }

    /// Shares `flag` with throttled reads; setting it cancels their waits.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Overrides how destination files are digested for verification.
    #[must_use]
    pub fn with_local_digest(mut self, local_digest: LocalDigestFn) -> Self {
        self.local_digest = local_digest;
        self
    }

    /// Returns whether digest verification is enabled.
    #[must_use]
    pub fn checksum_enabled(&self) -> bool {
        self.checksum_enabled
    }

    /// Returns the interrupt flag observed by throttled reads.
    #[must_use]
    pub fn interrupt_flag(&self) -> &Arc<AtomicBool> {
        &self.interrupted
    }

    /// Copies `source` in `namespace` to `dest`.
    ///
    /// `bandwidth_mb` caps the read rate in MB/s (1 MB = 1024 * 1024 bytes);
    /// `None` copies unthrottled. The limit is applied to each file as it is
    /// opened, so a zero limit fails the first file read and nothing else. The namespace handle is released before
    /// this returns, on success and on every error.
    ///
    /// # Errors
    ///
    /// Returns [`CopyError`] if the handle cannot be opened, the source does
    /// not exist, a transfer fails, or a digest mismatches.
    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    pub async fn copy(
        &self,
        namespace: &str,
        source: &str,
        dest: &Path,
        bandwidth_mb: Option<u32>,
    ) -> Result<CopyOutcome, CopyError> {
        let fs = self.provider.open(namespace).await?;
        self.copy_path(fs.as_ref(), source, dest, bandwidth_mb).await
    }

    /// Copies `source` using an already opened handle.
    ///
    /// # Errors
    ///
    /// See [`CopyEngine::copy`].
    pub async fn copy_path(
        &self,
        fs: &dyn RemoteFileSystem,
        source: &str,
        dest: &Path,
        bandwidth_mb: Option<u32>,
    ) -> Result<CopyOutcome, CopyError> {
        let rate = bytes_per_second(bandwidth_mb);

        if !fs.exists(source).await? {
            return Err(CopyError::not_found(source));
        }

        let status = fs.stat(source).await?;
        if status.is_directory {
            self.copy_directory(fs, source, dest, rate).await
        } else {
            self.copy_file(fs, source, dest, rate).await
        }
    }

    async fn copy_file(
        &self,
        fs: &dyn RemoteFileSystem,
        source: &str,
        dest: &Path,
        rate: Option<u64>,
    ) -> Result<CopyOutcome, CopyError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CopyError::io(parent, e))?;
        }

        let (bytes_copied, checksum_verified) = self.transfer(fs, source, dest, rate).await?;

        info!(
            source,
            bytes = bytes_copied,
            checksum_verified,
            "file copy completed"
        );
        Ok(CopyOutcome {
            bytes_copied,
            checksum_verified,
            files_copied: 1,
        })
    }

    async fn copy_directory(
        &self,
        fs: &dyn RemoteFileSystem,
        source: &str,
        dest: &Path,
        rate: Option<u64>,
    ) -> Result<CopyOutcome, CopyError> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| CopyError::io(dest, e))?;

        let mut pending = vec![(source.to_string(), dest.to_path_buf())];
        let mut bytes_copied: u64 = 0;
        let mut files_copied: usize = 0;
        let mut dirs_created: usize = 1;
        let mut all_verified = true;

        while let Some((remote_dir, local_dir)) = pending.pop() {
            for entry in fs.list(&remote_dir).await? {
                let local_path = local_child(&local_dir, &entry)?;
                if entry.is_directory {
                    tokio::fs::create_dir_all(&local_path)
                        .await
                        .map_err(|e| CopyError::io(&local_path, e))?;
                    dirs_created += 1;
                    pending.push((entry.path, local_path));
                } else {
                    let (bytes, verified) = self.transfer(fs, &entry.path, &local_path, rate).await?;
                    debug!(path = %entry.path, bytes, verified, "copied file");
                    bytes_copied += bytes;
                    files_copied += 1;
                    all_verified &= verified;
                }
            }
        }

        info!(
            source,
            files = files_copied,
            dirs = dirs_created,
            bytes = bytes_copied,
            "directory copy completed"
        );
        Ok(CopyOutcome {
            bytes_copied,
            checksum_verified: all_verified && files_copied > 0,
            files_copied,
        })
    }

    /// Streams one remote file to `dest`, returning bytes written and
    /// whether the digest was verified.
    async fn transfer(
        &self,
        fs: &dyn RemoteFileSystem,
        source: &str,
        dest: &Path,
        rate: Option<u64>,
    ) -> Result<(u64, bool), CopyError> {
        let stream = fs.open_read(source).await?;
        let stream: ByteStream = match rate {
            Some(rate) => Box::new(
                ThrottledReader::new(stream, rate)?.with_interrupt(Arc::clone(&self.interrupted)),
            ),
            None => stream,
        };

        let mut file = File::create(dest)
            .await
            .map_err(|e| CopyError::io(dest, e))?;

        let streamed = if self.checksum_enabled {
            let mut reader = DigestReader::new(stream);
            match stream_to_file(&mut reader, &mut file, source, dest).await {
                Ok(bytes) => Ok((bytes, Some(reader.hex_digest()))),
                Err(error) => Err(error),
            }
        } else {
            let mut reader = stream;
            stream_to_file(&mut reader, &mut file, source, dest)
                .await
                .map(|bytes| (bytes, None))
        };
        drop(file);

        let (bytes, source_digest) = match streamed {
            Ok(streamed) => streamed,
            Err(error) => {
                debug!(path = %dest.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(dest).await;
                return Err(error);
            }
        };

        match source_digest {
            Some(source_digest) => {
                self.verify_checksum(dest, &source_digest).await?;
                Ok((bytes, true))
            }
            None => Ok((bytes, false)),
        }
    }

    async fn verify_checksum(&self, dest: &Path, source_digest: &str) -> Result<(), CopyError> {
        let local_digest = self.local_digest;
        let path = dest.to_path_buf();
        let local = tokio::task::spawn_blocking(move || local_digest(&path))
            .await
            .map_err(|e| CopyError::io(dest, io::Error::other(e)))?
            .map_err(|e| CopyError::io(dest, e))?;

        if local != source_digest {
            warn!(
                path = %dest.display(),
                source_digest,
                local_digest = %local,
                "checksum mismatch"
            );
            return Err(CopyError::integrity(dest, source_digest, local));
        }

        debug!(path = %dest.display(), digest = %local, "checksum verified");
        Ok(())
    }
}

/// Converts an MB/s limit into bytes per second.
///
/// Zero passes through; [`ThrottledReader::new`] rejects it.
fn bytes_per_second(bandwidth_mb: Option<u32>) -> Option<u64> {
    bandwidth_mb.map(|mb| u64::from(mb) * BYTES_PER_MB)
}

/// Places a listed entry under `local_dir`.
///
/// The entry name must be a single normal path component, so a listing can
/// never address anything outside the destination tree.
fn local_child(local_dir: &Path, entry: &FileStatus) -> Result<PathBuf, CopyError> {
    let mut components = Path::new(entry.name()).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => Ok(local_dir.join(part)),
        _ => Err(FsError::InvalidPath {
            path: entry.path.clone(),
        }
        .into()),
    }
}

async fn stream_to_file<R: AsyncRead + Unpin>(
    reader: &mut R,
    file: &mut File,
    source: &str,
    dest: &Path,
) -> Result<u64, CopyError> {
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut bytes_written: u64 = 0;

    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| CopyError::read(source, e))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .await
            .map_err(|e| CopyError::io(dest, e))?;
        bytes_written += read as u64;
    }

    writer.flush().await.map_err(|e| CopyError::io(dest, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::fs::LocalFileSystemProvider;

    struct Fixture {
        _conf: TempDir,
        data: TempDir,
        out: TempDir,
        provider: Arc<LocalFileSystemProvider>,
    }

    fn fixture() -> Fixture {
        let conf = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::write(
            conf.path().join("ns1.conf"),
            format!("root = \"{}\"\n", data.path().display()),
        )
        .unwrap();
        let provider = Arc::new(LocalFileSystemProvider::new(conf.path()));
        Fixture {
            _conf: conf,
            data,
            out,
            provider,
        }
    }

    fn engine(fixture: &Fixture, checksum_enabled: bool) -> CopyEngine {
        CopyEngine::new(fixture.provider.clone(), checksum_enabled)
    }

    #[allow(clippy::unnecessary_wraps)]
    fn wrong_digest(_path: &Path) -> io::Result<String> {
        Ok("0000".to_string())
    }

    #[tokio::test]
    async fn test_copy_single_file_verified() {
        let fixture = fixture();
        std::fs::write(fixture.data.path().join("file.txt"), b"hello world").unwrap();
        let dest = fixture.out.path().join("nested/dir/file.txt");

        let outcome = engine(&fixture, true)
            .copy("ns1", "/file.txt", &dest, None)
            .await
            .unwrap();

        assert_eq!(outcome.bytes_copied, 11);
        assert!(outcome.checksum_verified);
        assert_eq!(outcome.files_copied, 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
        assert_eq!(fixture.provider.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_copy_checksum_disabled_is_not_verified() {
        let fixture = fixture();
        std::fs::write(fixture.data.path().join("file.txt"), b"abc").unwrap();
        let dest = fixture.out.path().join("file.txt");

        let outcome = engine(&fixture, false)
            .copy("ns1", "/file.txt", &dest, None)
            .await
            .unwrap();

        assert_eq!(outcome.bytes_copied, 3);
        assert!(!outcome.checksum_verified);
    }

    #[tokio::test]
    async fn test_copy_zero_byte_file_is_verified() {
        let fixture = fixture();
        std::fs::write(fixture.data.path().join("empty"), b"").unwrap();
        let dest = fixture.out.path().join("empty");

        let outcome = engine(&fixture, true)
            .copy("ns1", "/empty", &dest, None)
            .await
            .unwrap();

        assert_eq!(outcome.bytes_copied, 0);
        assert!(outcome.checksum_verified);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_copy_missing_source_is_not_found_and_releases_handle() {
        let fixture = fixture();
        let dest = fixture.out.path().join("x");

        let err = engine(&fixture, true)
            .copy("ns1", "/nope", &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::NotFound { ref path } if path == "/nope"));
        assert_eq!(err.to_string(), "source path does not exist: /nope");
        assert!(!dest.exists());
        assert_eq!(fixture.provider.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_copy_unknown_namespace_is_fs_error() {
        let fixture = fixture();
        let err = engine(&fixture, true)
            .copy("missing-ns", "/a", &fixture.out.path().join("a"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CopyError::Fs(FsError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_copy_directory_tree() {
        let fixture = fixture();
        let root = fixture.data.path().join("dir");
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("a.txt"), b"aaaa").unwrap();
        std::fs::write(root.join("sub/b.txt"), b"bb").unwrap();
        std::fs::write(root.join("sub/deeper/c.txt"), b"c").unwrap();
        let dest = fixture.out.path().join("dir");

        let outcome = engine(&fixture, true)
            .copy("ns1", "/dir", &dest, None)
            .await
            .unwrap();

        assert_eq!(outcome.bytes_copied, 7);
        assert_eq!(outcome.files_copied, 3);
        assert!(outcome.checksum_verified);
        assert_eq!(std::fs::read(dest.join("a.txt")).unwrap(), b"aaaa");
        assert_eq!(std::fs::read(dest.join("sub/b.txt")).unwrap(), b"bb");
        assert_eq!(std::fs::read(dest.join("sub/deeper/c.txt")).unwrap(), b"c");
        assert!(dest.join("empty").is_dir());
    }

    #[tokio::test]
    async fn test_copy_empty_directory_is_not_verified() {
        let fixture = fixture();
        std::fs::create_dir_all(fixture.data.path().join("hollow")).unwrap();
        let dest = fixture.out.path().join("hollow");

        let outcome = engine(&fixture, true)
            .copy("ns1", "/hollow", &dest, None)
            .await
            .unwrap();

        assert_eq!(outcome.bytes_copied, 0);
        assert_eq!(outcome.files_copied, 0);
        assert!(!outcome.checksum_verified);
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn test_copy_digest_mismatch_is_integrity_error() {
        let fixture = fixture();
        std::fs::write(fixture.data.path().join("file.txt"), b"payload").unwrap();
        let dest = fixture.out.path().join("file.txt");

        let err = engine(&fixture, true)
            .with_local_digest(wrong_digest)
            .copy("ns1", "/file.txt", &dest, None)
            .await
            .unwrap_err();

        match err {
            CopyError::Integrity {
                path,
                source_digest,
                local_digest,
            } => {
                assert_eq!(path, dest);
                assert_eq!(source_digest.len(), 64);
                assert_eq!(local_digest, "0000");
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_copy_zero_bandwidth_is_rejected() {
        let fixture = fixture();
        std::fs::write(fixture.data.path().join("file.txt"), b"abc").unwrap();
        let dest = fixture.out.path().join("file.txt");

        let err = engine(&fixture, true)
            .copy("ns1", "/file.txt", &dest, Some(0))
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::InvalidBandwidth { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_copy_with_bandwidth_limit_completes() {
        let fixture = fixture();
        std::fs::write(fixture.data.path().join("file.txt"), vec![1u8; 4096]).unwrap();
        let dest = fixture.out.path().join("file.txt");

        let outcome = engine(&fixture, true)
            .copy("ns1", "/file.txt", &dest, Some(1))
            .await
            .unwrap();

        assert_eq!(outcome.bytes_copied, 4096);
        assert!(outcome.checksum_verified);
    }

    #[test]
    fn test_bytes_per_second_uses_binary_megabytes() {
        assert_eq!(bytes_per_second(None), None);
        assert_eq!(bytes_per_second(Some(2)), Some(2 * 1024 * 1024));
        assert_eq!(bytes_per_second(Some(0)), Some(0));
    }

    #[tokio::test]
    async fn test_copy_missing_source_with_zero_bandwidth_is_not_found() {
        let fixture = fixture();
        let dest = fixture.out.path().join("missing");

        let err = engine(&fixture, true)
            .copy("ns1", "/missing", &dest, Some(0))
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::NotFound { ref path } if path == "/missing"));
    }

    #[tokio::test]
    async fn test_copy_empty_directory_with_zero_bandwidth_succeeds() {
        let fixture = fixture();
        std::fs::create_dir_all(fixture.data.path().join("empty/inner")).unwrap();
        let dest = fixture.out.path().join("empty");

        let outcome = engine(&fixture, true)
            .copy("ns1", "/empty", &dest, Some(0))
            .await
            .unwrap();

        assert_eq!(outcome.files_copied, 0);
        assert_eq!(outcome.bytes_copied, 0);
        assert!(dest.join("inner").is_dir());
    }

    #[test]
    fn test_local_child_accepts_plain_names_only() {
        let dir = Path::new("/out");
        let status = |path: &str| FileStatus {
            path: path.to_string(),
            is_directory: false,
            length: 0,
        };

        assert_eq!(
            local_child(dir, &status("/src/a.txt")).unwrap(),
            PathBuf::from("/out/a.txt")
        );
        for bad in ["/src/..", "/src/."] {
            let err = local_child(dir, &status(bad)).unwrap_err();
            assert!(
                matches!(err, CopyError::Fs(FsError::InvalidPath { .. })),
                "{bad} should be rejected"
            );
        }
    }

    /// Handle whose file stream fails after a few bytes.
    struct BrokenStreamFs;

    #[async_trait]
    impl RemoteFileSystem for BrokenStreamFs {
        async fn exists(&self, _path: &str) -> Result<bool, FsError> {
            Ok(true)
        }

        async fn stat(&self, path: &str) -> Result<FileStatus, FsError> {
            Ok(FileStatus {
                path: path.to_string(),
                is_directory: false,
                length: 10,
            })
        }

        async fn list(&self, _path: &str) -> Result<Vec<FileStatus>, FsError> {
            Ok(Vec::new())
        }

        async fn open_read(&self, _path: &str) -> Result<ByteStream, FsError> {
            let stream = tokio_test::io::Builder::new()
                .read(b"abc")
                .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
                .build();
            Ok(Box::new(stream))
        }
    }

    /// Handle whose directory listing names an entry `..`.
    struct EscapingListingFs;

    #[async_trait]
    impl RemoteFileSystem for EscapingListingFs {
        async fn exists(&self, _path: &str) -> Result<bool, FsError> {
            Ok(true)
        }

        async fn stat(&self, path: &str) -> Result<FileStatus, FsError> {
            Ok(FileStatus {
                path: path.to_string(),
                is_directory: true,
                length: 0,
            })
        }

        async fn list(&self, path: &str) -> Result<Vec<FileStatus>, FsError> {
            Ok(vec![FileStatus {
                path: format!("{path}/.."),
                is_directory: false,
                length: 3,
            }])
        }

        async fn open_read(&self, _path: &str) -> Result<ByteStream, FsError> {
            Ok(Box::new(&b"abc"[..]))
        }
    }

    #[tokio::test]
    async fn test_directory_entry_escaping_destination_is_rejected() {
        let fixture = fixture();
        let dest = fixture.out.path().join("tree");

        let err = engine(&fixture, true)
            .copy_path(&EscapingListingFs, "/tree", &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::Fs(FsError::InvalidPath { ref path }) if path == "/tree/.."));
        let written: Vec<_> = std::fs::read_dir(fixture.out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(written, vec![std::ffi::OsString::from("tree")]);
    }

    #[tokio::test]
    async fn test_stream_failure_removes_partial_file() {
        let fixture = fixture();
        let dest = fixture.out.path().join("broken.bin");

        let err = engine(&fixture, true)
            .copy_path(&BrokenStreamFs, "/broken.bin", &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::Read { .. }));
        assert!(!dest.exists(), "partial file should be cleaned up");
    }
}
