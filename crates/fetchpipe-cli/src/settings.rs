//! Configuration loading for the command line
//!
//! Layers, lowest first: built-in defaults, the TOML file given with
//! `--config`, then `--cache-root` (which clap also fills from
//! `FETCHPIPE_CACHE_ROOT`).

use anyhow::Context;
use fetchpipe_core::{ContentionPolicy, PipelineConfig};
use std::path::{Path, PathBuf};

/// Overrides taken from the command line
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) cache_root: Option<PathBuf>,
    pub(crate) wait: bool,
}

pub(crate) fn load(file: Option<&Path>, overrides: Overrides) -> anyhow::Result<PipelineConfig> {
    let mut config = match file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(root) = overrides.cache_root {
        config = config.with_cache_root(root);
    }
    if overrides.wait {
        config = config.with_contention(ContentionPolicy::Wait);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = load(None, Overrides::default()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache_root = \"/from/file\"\nsniff_bytes = 64").unwrap();

        let from_file = load(Some(file.path()), Overrides::default()).unwrap();
        assert_eq!(from_file.cache_root, PathBuf::from("/from/file"));
        assert_eq!(from_file.sniff_bytes, 64);

        let overridden = load(
            Some(file.path()),
            Overrides {
                cache_root: Some("/from/flag".into()),
                wait: true,
            },
        )
        .unwrap();
        assert_eq!(overridden.cache_root, PathBuf::from("/from/flag"));
        assert_eq!(overridden.sniff_bytes, 64);
        assert_eq!(overridden.contention, ContentionPolicy::Wait);
    }

    #[test]
    fn bad_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lock_ttl_secs = \"soon\"").unwrap();

        let err = load(Some(file.path()), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("parse config"));
    }
}
