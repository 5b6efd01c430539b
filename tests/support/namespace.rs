//! Namespace fixtures backed by temporary directories.
//!
//! A fixture owns three temp dirs: the conf basedir holding `<ns>.conf`
//! files, the data root the namespace resolves to, and an output dir for
//! copy destinations. Keep the fixture alive for as long as the paths are used.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use copier_core::LocalFileSystemProvider;
use tempfile::TempDir;

pub struct NamespaceFixture {
    pub conf: TempDir,
    pub data: TempDir,
    pub out: TempDir,
    pub provider: Arc<LocalFileSystemProvider>,
}

impl NamespaceFixture {
    /// Creates a fixture with one unauthenticated namespace.
    pub fn new(namespace: &str) -> Self {
        let conf = TempDir::new().expect("Failed to create conf dir");
        let data = TempDir::new().expect("Failed to create data dir");
        let out = TempDir::new().expect("Failed to create output dir");
        write_namespace_conf(conf.path(), namespace, data.path(), None);
        let provider = Arc::new(LocalFileSystemProvider::new(conf.path()));
        Self {
            conf,
            data,
            out,
            provider,
        }
    }

    /// Adds a namespace that requires `principal`, optionally writing a
    /// keytab that contains it.
    pub fn add_kerberized_namespace(&self, namespace: &str, principal: &str, with_keytab: bool) {
        write_namespace_conf(self.conf.path(), namespace, self.data.path(), Some(principal));
        if with_keytab {
            std::fs::write(
                self.conf.path().join(format!("{namespace}.keytab")),
                format!("{principal}\n"),
            )
            .expect("Failed to write keytab");
        }
    }

    /// Writes a remote file at `remote` (absolute, `/`-separated).
    pub fn write_file(&self, remote: &str, content: &[u8]) -> PathBuf {
        let path = self.remote_path(remote);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create remote parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write remote file");
        path
    }

    /// Creates a remote directory (and its parents).
    pub fn mkdir(&self, remote: &str) {
        std::fs::create_dir_all(self.remote_path(remote)).expect("Failed to create remote dir");
    }

    /// Local destination path under the output dir.
    pub fn dest(&self, name: &str) -> PathBuf {
        self.out.path().join(name)
    }

    /// Local destination path as a string, for item submission.
    pub fn dest_str(&self, name: &str) -> String {
        self.dest(name).to_string_lossy().into_owned()
    }

    fn remote_path(&self, remote: &str) -> PathBuf {
        self.data.path().join(remote.trim_start_matches('/'))
    }
}

fn write_namespace_conf(conf_dir: &Path, namespace: &str, root: &Path, principal: Option<&str>) {
    let mut body = format!("root = \"{}\"\n", root.display());
    if let Some(principal) = principal {
        body.push_str(&format!("principal = \"{principal}\"\n"));
    }
    std::fs::write(conf_dir.join(format!("{namespace}.conf")), body)
        .expect("Failed to write namespace conf");
}

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
