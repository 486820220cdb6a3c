//! Where docman keeps its store on disk.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DOCMAN_DATA_DIR";

/// XDG prefix under the user's data home.
const XDG_PREFIX: &str = "docman";

/// File name of the redb store inside the data directory.
pub const STORE_FILE: &str = "docman.redb";

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Use `explicit` if given, else [`DATA_DIR_ENV`], else
    /// `$XDG_DATA_HOME/docman`. The directory is created when missing.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        let root = match choose_root(explicit, from_env) {
            Some(root) => root,
            None => xdg_data_home()?,
        };
        Self::create(root)
    }

    fn create(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_db(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }
}

fn choose_root(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| from_env.filter(|p| !p.as_os_str().is_empty()))
}

fn xdg_data_home() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix(XDG_PREFIX)
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.store_db(), tmp.path().join(STORE_FILE));
    }

    #[test]
    fn explicit_path_beats_environment() {
        let chosen = choose_root(
            Some(Path::new("/explicit")),
            Some(PathBuf::from("/from-env")),
        );
        assert_eq!(chosen, Some(PathBuf::from("/explicit")));
    }

    #[test]
    fn environment_used_when_no_explicit_path() {
        assert_eq!(
            choose_root(None, Some(PathBuf::from("/from-env"))),
            Some(PathBuf::from("/from-env"))
        );
        assert_eq!(choose_root(None, Some(PathBuf::new())), None);
        assert_eq!(choose_root(None, None), None);
    }

    #[test]
    fn missing_directory_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();

        assert!(dir.root().is_dir());
    }

    #[test]
    fn uncreatable_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();

        let err = DataDir::resolve(Some(&file.join("below"))).unwrap_err();
        assert!(matches!(err, Error::DataDir(_)));
    }
}
