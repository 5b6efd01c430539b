//! Resolves the effective configuration: CLI flag > config file > default.

use anyhow::{Context, Result};
use copier_core::CopierConfig;
use tracing::debug;

use crate::cli::Args;

pub(crate) fn resolve_config(args: &Args) -> Result<CopierConfig> {
    let base = match &args.config {
        Some(path) => CopierConfig::load(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => CopierConfig::load_default()
            .context("failed to load default config file")?
            .unwrap_or_default(),
    };
    let config = apply_cli_overrides(base, args);
    config.validate()?;
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn apply_cli_overrides(mut config: CopierConfig, args: &Args) -> CopierConfig {
    if let Some(threads) = args.threads {
        config.thread_pool_size = usize::from(threads);
    }
    if args.no_checksum {
        config.checksum_enabled = false;
    }
    if let Some(conf_basedir) = &args.conf_basedir {
        config.conf_basedir.clone_from(conf_basedir);
    }
    config
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["copier", "-n", "ns1", "-i", "/a=/b"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let file = CopierConfig::parse(
            "thread_pool_size = 4\nchecksum_enabled = true\nconf_basedir = \"/from/file\"\n",
        )
        .unwrap();

        let config = apply_cli_overrides(
            file,
            &args(&["--threads", "8", "--no-checksum", "--conf-basedir", "/from/cli"]),
        );

        assert_eq!(config.thread_pool_size, 8);
        assert!(!config.checksum_enabled);
        assert_eq!(config.conf_basedir, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_file_values_kept_without_flags() {
        let file = CopierConfig::parse("thread_pool_size = 4\nchecksum_enabled = false\n").unwrap();
        let config = apply_cli_overrides(file, &args(&[]));
        assert_eq!(config.thread_pool_size, 4);
        assert!(!config.checksum_enabled);
    }

    #[test]
    fn test_resolve_config_reads_explicit_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "thread_pool_size = 3\n").unwrap();

        let config = resolve_config(&args(&["--config", path.to_str().unwrap()])).unwrap();

        assert_eq!(config.thread_pool_size, 3);
        assert!(config.checksum_enabled);
    }

    #[test]
    fn test_resolve_config_missing_explicit_file_errors() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");
        let err = resolve_config(&args(&["--config", path.to_str().unwrap()])).unwrap_err();
        assert!(err.to_string().contains("failed to load config file"));
    }
}
