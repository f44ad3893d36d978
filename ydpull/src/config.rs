use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Mirror directory created next to the invocation directory when
/// `local_dir` is left empty.
pub const DEFAULT_MIRROR_DIR_NAME: &str = "youdaonote";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "{path} is not a valid config: {source}; expected a UTF-8 JSON object with exactly the \
         keys local_dir, ydnote_dir, smms_secret_token and is_relative_path"
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to create mirror root {path}: {source}; check that its parent exists")]
    MirrorRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("current working directory is unavailable: {0}")]
    WorkingDir(#[source] std::io::Error),
}

/// Pull settings loaded from `config.json`.
///
/// All four keys must be present and no other key is accepted, so a typo in
/// the file fails loudly instead of silently falling back to a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullConfig {
    /// Local mirror root. Empty means `./youdaonote` under the invocation
    /// directory.
    pub local_dir: String,
    /// Name of a single top-level remote folder to mirror. Empty means the
    /// whole account.
    pub ydnote_dir: String,
    /// SM.MS API token. Empty disables the image relay and keeps media local.
    pub smms_secret_token: String,
    /// Rewrite migrated media references as `../assets/...` instead of
    /// absolute local paths.
    pub is_relative_path: bool,
}

impl PullConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolves the mirror root and creates it when absent.
    ///
    /// Only the final directory is created; a missing parent is a
    /// configuration mistake and fails the run.
    pub fn resolve_mirror_root(&self) -> Result<PathBuf, ConfigError> {
        let root = if self.local_dir.is_empty() {
            std::env::current_dir()
                .map_err(ConfigError::WorkingDir)?
                .join(DEFAULT_MIRROR_DIR_NAME)
        } else {
            PathBuf::from(&self.local_dir)
        };
        if !root.exists() {
            std::fs::create_dir(&root).map_err(|source| ConfigError::MirrorRoot {
                path: root.clone(),
                source,
            })?;
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_complete_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "local_dir": "/tmp/mirror",
                "ydnote_dir": "Blog",
                "smms_secret_token": "tok",
                "is_relative_path": true
            }"#,
        );
        let config = PullConfig::load(&path).unwrap();
        assert_eq!(config.local_dir, "/tmp/mirror");
        assert_eq!(config.ydnote_dir, "Blog");
        assert_eq!(config.smms_secret_token, "tok");
        assert!(config.is_relative_path);
    }

    #[test]
    fn rejects_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "local_dir": "",
                "ydnote_dir": "",
                "smms_secret_token": "",
                "is_relative_path": false,
                "extra": 1
            }"#,
        );
        assert!(matches!(
            PullConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"local_dir": "", "ydnote_dir": "", "smms_secret_token": ""}"#,
        );
        assert!(matches!(
            PullConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PullConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn resolve_creates_mirror_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mirror");
        let config = PullConfig {
            local_dir: root.to_string_lossy().into_owned(),
            ydnote_dir: String::new(),
            smms_secret_token: String::new(),
            is_relative_path: false,
        };
        let resolved = config.resolve_mirror_root().unwrap();
        assert_eq!(resolved, root);
        assert!(root.is_dir());
        // A second resolve finds the directory already in place.
        assert_eq!(config.resolve_mirror_root().unwrap(), root);
    }

    #[test]
    fn missing_parent_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("absent-parent").join("mirror");
        let config = PullConfig {
            local_dir: root.to_string_lossy().into_owned(),
            ydnote_dir: String::new(),
            smms_secret_token: String::new(),
            is_relative_path: false,
        };
        assert!(matches!(
            config.resolve_mirror_root(),
            Err(ConfigError::MirrorRoot { .. })
        ));
    }
}
