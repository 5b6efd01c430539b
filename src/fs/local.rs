//! Directory-backed filesystem provider.
//!
//! Each namespace is described by `<conf_basedir>/<namespace>.conf`:
//!
//! ```text
//! root = "/srv/warehouse"     # remote paths resolve below this directory
//! principal = "etl@EXAMPLE"   # optional; must match <namespace>.keytab
//! ```
//!
//! Namespace configuration is resolved once per namespace and cached for
//! the lifetime of the provider. A failed resolution is not cached, so a
//! corrected configuration file is picked up by the next `open`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use super::{ByteStream, FileStatus, FileSystemProvider, FsError, RemoteFileSystem, join_remote};
use crate::config::{self, ConfigError};

/// Resolved configuration for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Local directory that remote paths are resolved against.
    pub root: PathBuf,
    /// Principal the namespace requires, if any.
    pub principal: Option<String>,
}

impl NamespaceConfig {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut root = None;
        let mut principal = None;
        for entry in config::parse_lines(raw)? {
            match entry.key {
                "root" => root = Some(PathBuf::from(config::parse_string_literal(&entry)?)),
                "principal" => principal = Some(config::parse_string_literal(&entry)?),
                unknown => {
                    return Err(ConfigError::UnknownKey {
                        key: unknown.to_string(),
                        line: entry.line,
                    });
                }
            }
        }
        let root = root.ok_or(ConfigError::MissingKey { key: "root" })?;
        Ok(Self { root, principal })
    }
}

/// Provider that serves namespaces from local directories.
///
/// Safe to share behind `Arc`; the namespace cache is a `DashMap` so
/// concurrent `open` calls for different namespaces never contend.
#[derive(Debug)]
pub struct LocalFileSystemProvider {
    conf_basedir: PathBuf,
    configs: DashMap<String, Arc<NamespaceConfig>>,
    open_handles: Arc<AtomicUsize>,
}

impl LocalFileSystemProvider {
    /// Creates a provider reading namespace files from `conf_basedir`.
    #[must_use]
    pub fn new(conf_basedir: impl Into<PathBuf>) -> Self {
        Self {
            conf_basedir: conf_basedir.into(),
            configs: DashMap::new(),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the configuration directory.
    #[must_use]
    pub fn conf_basedir(&self) -> &Path {
        &self.conf_basedir
    }

    /// Returns the number of handles currently open.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Returns the cached configuration for `namespace`, resolving it on
    /// first use.
    ///
    /// Resolution reads the conf basedir on the blocking pool and holds no
    /// cache lock while doing so. Two concurrent first opens of the same
    /// namespace may both resolve it; the first one inserted is kept.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Configuration`] when the namespace file is missing
    /// or invalid, and [`FsError::Authentication`] when its principal cannot
    /// be satisfied.
    pub async fn namespace_config(&self, namespace: &str) -> Result<Arc<NamespaceConfig>, FsError> {
        if let Some(cached) = self.configs.get(namespace) {
            return Ok(Arc::clone(cached.value()));
        }

        let conf_basedir = self.conf_basedir.clone();
        let name = namespace.to_string();
        let resolved = tokio::task::spawn_blocking(move || build_configuration(&conf_basedir, &name))
            .await
            .map_err(|e| FsError::configuration(namespace, format!("resolution aborted: {e}")))??;

        let cached = self
            .configs
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(resolved));
        Ok(Arc::clone(cached.value()))
    }
}

fn build_configuration(conf_basedir: &Path, namespace: &str) -> Result<NamespaceConfig, FsError> {
    if namespace.is_empty() || namespace.contains(['/', '\\']) || namespace.starts_with('.') {
        return Err(FsError::configuration(namespace, "invalid namespace name"));
    }

    let path = conf_basedir.join(format!("{namespace}.conf"));
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        FsError::configuration(
            namespace,
            format!("cannot read {}: {e}", path.display()),
        )
    })?;
    let parsed = NamespaceConfig::parse(&raw).map_err(|e| {
        FsError::configuration(namespace, format!("{}: {e}", path.display()))
    })?;

    if !parsed.root.is_dir() {
        return Err(FsError::configuration(
            namespace,
            format!("root {} is not a directory", parsed.root.display()),
        ));
    }

    if let Some(principal) = parsed.principal.as_deref() {
        authenticate(conf_basedir, namespace, principal)?;
    }

    info!(namespace, root = %parsed.root.display(), "created namespace configuration");
    Ok(parsed)
}

fn authenticate(conf_basedir: &Path, namespace: &str, principal: &str) -> Result<(), FsError> {
    let keytab = conf_basedir.join(format!("{namespace}.keytab"));
    let Ok(contents) = std::fs::read_to_string(&keytab) else {
        warn!(namespace, keytab = %keytab.display(), "keytab unavailable");
        return Err(FsError::authentication(
            namespace,
            format!("no keytab at {}", keytab.display()),
        ));
    };
    if contents.lines().any(|line| line.trim() == principal) {
        Ok(())
    } else {
        warn!(namespace, principal, "principal not present in keytab");
        Err(FsError::authentication(
            namespace,
            format!("principal {principal} not present in keytab"),
        ))
    }
}

#[async_trait]
impl FileSystemProvider for LocalFileSystemProvider {
    #[instrument(skip(self))]
    async fn open(&self, namespace: &str) -> Result<Box<dyn RemoteFileSystem>, FsError> {
        let config = self.namespace_config(namespace).await?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        debug!(namespace, "opened filesystem handle");
        Ok(Box::new(LocalFileSystem {
            namespace: namespace.to_string(),
            root: config.root.clone(),
            open_handles: Arc::clone(&self.open_handles),
        }))
    }
}

/// Handle to one namespace served from a local directory.
///
/// Dropping the handle releases it.
#[derive(Debug)]
pub struct LocalFileSystem {
    namespace: String,
    root: PathBuf,
    open_handles: Arc<AtomicUsize>,
}

impl LocalFileSystem {
    /// Maps a remote path onto the namespace root, rejecting `..`.
    fn resolve(&self, path: &str) -> Result<PathBuf, FsError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(FsError::InvalidPath {
                        path: path.to_string(),
                    });
                }
            }
        }
        Ok(resolved)
    }
}

impl Drop for LocalFileSystem {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
        debug!(namespace = %self.namespace, "released filesystem handle");
    }
}

#[async_trait]
impl RemoteFileSystem for LocalFileSystem {
    async fn exists(&self, path: &str) -> Result<bool, FsError> {
        let local = self.resolve(path)?;
        tokio::fs::try_exists(&local)
            .await
            .map_err(|e| FsError::io(path, e))
    }

    async fn stat(&self, path: &str) -> Result<FileStatus, FsError> {
        let local = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&local)
            .await
            .map_err(|e| FsError::io(path, e))?;
        Ok(FileStatus {
            path: path.to_string(),
            is_directory: metadata.is_dir(),
            length: if metadata.is_dir() { 0 } else { metadata.len() },
        })
    }

    async fn list(&self, path: &str) -> Result<Vec<FileStatus>, FsError> {
        let local = self.resolve(path)?;
        let mut entries = tokio::fs::read_dir(&local)
            .await
            .map_err(|e| FsError::io(path, e))?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| FsError::io(path, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_path = join_remote(path, &name);
            // Follows symlinks so listings agree with `stat`.
            let metadata = tokio::fs::metadata(entry.path())
                .await
                .map_err(|e| FsError::io(child_path.clone(), e))?;
            children.push(FileStatus {
                path: child_path,
                is_directory: metadata.is_dir(),
                length: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    async fn open_read(&self, path: &str) -> Result<ByteStream, FsError> {
        let local = self.resolve(path)?;
        let file = tokio::fs::File::open(&local)
            .await
            .map_err(|e| FsError::io(path, e))?;
        Ok(Box::new(file))
    }
}
