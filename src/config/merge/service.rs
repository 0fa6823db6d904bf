//! MergeService: orchestrates sources, applies merge policy, deserializes to SscConfig.

use crate::config::sources::{environment, global_file};
use crate::config::SscConfig;
use config::{ConfigError, File, FileFormat};
use std::path::Path;

use super::merge_policy;

pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<SscConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => builder.add_source(File::from(path).format(FileFormat::Toml).required(true)),
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    pub fn load_from_file(path: &Path) -> Result<SscConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ssc.toml");
        std::fs::write(
            &path,
            "[transport]\nport = 4545\nparallel = true\n\n[storage]\nbackup_dir = \"/srv/backups\"\n",
        )
        .unwrap();

        let config = MergeService::load_from_file(&path).unwrap();
        assert_eq!(config.transport.port, 4545);
        assert!(config.transport.parallel);
        assert_eq!(config.transport.timeout_ms, 1000);
        assert_eq!(
            config.storage.backup_dir.as_deref(),
            Some(Path::new("/srv/backups"))
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(MergeService::load_from_file(&temp.path().join("absent.toml")).is_err());
    }
}
