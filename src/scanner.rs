use std::{
    fs::{DirEntry, Metadata},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    model::{Directory, Document},
};

/// A directory whose entries have been read but which is not yet attached
/// to its parent.
struct Pending {
    dir: Directory,
    parent: Option<usize>,
    fs_path: PathBuf,
}

/// Build a [`Directory`] tree from the file system below `root`.
///
/// The root node has path `""` and the root folder's name; everything below
/// it is keyed by its `/`-separated path relative to `root`. Documents get
/// their creation date (or modification date when the platform has none)
/// and no tags or properties.
///
/// Skips hidden entries (names starting with `.`) and symlinked
/// directories. Subdirectories that cannot be read are logged and skipped;
/// failing to read `root` itself is an error.
pub fn scan(root: &Path) -> Result<Directory> {
    let canonical_root = root.canonicalize()?;
    let root_name = canonical_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut nodes = vec![Pending {
        dir: Directory::new("", root_name),
        parent: None,
        fs_path: canonical_root.clone(),
    }];
    let mut stack = vec![0usize];

    while let Some(idx) = stack.pop() {
        let entries = match std::fs::read_dir(&nodes[idx].fs_path) {
            Ok(entries) => entries,
            Err(e) if idx == 0 => return Err(e.into()),
            Err(e) => {
                warn!(
                    path = %nodes[idx].fs_path.display(),
                    error = %e,
                    "skipping unreadable directory"
                );
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();

            // Skip hidden files and directories.
            if name.starts_with('.') {
                continue;
            }

            let relative = join(&nodes[idx].dir.path, &name);
            match classify(&entry) {
                Some(Entry::Dir) => {
                    nodes.push(Pending {
                        dir: Directory::new(relative, name),
                        parent: Some(idx),
                        fs_path: entry.path(),
                    });
                    stack.push(nodes.len() - 1);
                }
                Some(Entry::File(meta)) => match creation_date(&meta) {
                    Some(date) => nodes[idx]
                        .dir
                        .documents
                        .push(Document::new(name, relative, date)),
                    None => {
                        warn!(path = %relative, "no file dates, skipping");
                    }
                },
                None => debug!(path = %relative, "skipping entry"),
            }
        }
        nodes[idx]
            .dir
            .documents
            .sort_by(|a, b| a.absolute_path().cmp(b.absolute_path()));
    }

    // Children always come after their parent, so attaching from the back
    // completes every subtree before its parent is attached.
    while let Some(node) = nodes.pop() {
        let mut dir = node.dir;
        dir.directories.sort_by(|a, b| a.path.cmp(&b.path));
        match node.parent {
            Some(parent) => nodes[parent].dir.directories.push(dir),
            None => return Ok(dir),
        }
    }
    Err(Error::NotFound {
        kind: "directory",
        name: canonical_root.display().to_string(),
    })
}

enum Entry {
    Dir,
    File(Metadata),
}

fn classify(entry: &DirEntry) -> Option<Entry> {
    let file_type = entry.file_type().ok()?;
    if file_type.is_dir() {
        return Some(Entry::Dir);
    }
    if file_type.is_file() {
        return entry.metadata().ok().map(Entry::File);
    }
    if file_type.is_symlink() {
        // Follow links to files; never descend through linked directories.
        let meta = std::fs::metadata(entry.path()).ok()?;
        if meta.is_file() {
            return Some(Entry::File(meta));
        }
    }
    None
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn creation_date(meta: &Metadata) -> Option<NaiveDate> {
    let time = meta.created().or_else(|_| meta.modified()).ok()?;
    Some(DateTime::<Local>::from(time).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dir: &Directory) -> Vec<&str> {
        dir.documents.iter().map(Document::filename).collect()
    }

    #[test]
    fn builds_tree_with_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(tmp.path().join("n1"), "one").unwrap();
        std::fs::write(sub.join("n2"), "two").unwrap();

        let root = scan(tmp.path()).unwrap();
        assert_eq!(root.path, "");
        assert_eq!(
            root.name,
            tmp.path()
                .canonicalize()
                .unwrap()
                .file_name()
                .unwrap()
                .to_string_lossy()
        );
        assert_eq!(names(&root), vec!["n1"]);
        assert_eq!(root.documents[0].absolute_path(), "n1");
        assert_eq!(root.documents[0].parent_path(), "");

        assert_eq!(root.directories.len(), 1);
        let sub = &root.directories[0];
        assert_eq!(sub.path, "sub");
        assert_eq!(sub.name, "sub");
        assert_eq!(sub.documents[0].absolute_path(), "sub/n2");
        assert_eq!(sub.documents[0].parent_path(), "sub");
    }

    #[test]
    fn documents_start_without_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("file.md"), "content").unwrap();

        let root = scan(tmp.path()).unwrap();
        let doc = &root.documents[0];
        assert!(doc.tags().is_empty());
        assert!(doc.properties().is_empty());

        let today = Local::now().date_naive();
        let age = today.signed_duration_since(doc.creation_date());
        assert!(age.num_days().abs() <= 1);
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".git");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("config"), "x").unwrap();
        std::fs::write(tmp.path().join(".hidden"), "x").unwrap();
        std::fs::write(tmp.path().join("visible"), "x").unwrap();

        let root = scan(tmp.path()).unwrap();
        assert_eq!(names(&root), vec!["visible"]);
        assert!(root.directories.is_empty());
    }

    #[test]
    fn children_are_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        for d in ["zeta", "alpha", "mid"] {
            std::fs::create_dir(tmp.path().join(d)).unwrap();
        }
        for f in ["z.md", "a.md", "m.md"] {
            std::fs::write(tmp.path().join(f), f).unwrap();
        }

        let root = scan(tmp.path()).unwrap();
        assert_eq!(names(&root), vec!["a.md", "m.md", "z.md"]);
        let dirs: Vec<&str> =
            root.directories.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(dirs, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn deep_nesting() {
        let tmp = tempfile::tempdir().unwrap();
        let mut path = tmp.path().to_path_buf();
        for i in 0..20 {
            path.push(format!("d{i}"));
        }
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("leaf"), "x").unwrap();

        let root = scan(tmp.path()).unwrap();
        let docs = crate::tree::flatten_documents(&root);
        assert_eq!(docs.len(), 1);
        assert!(docs[0].absolute_path().starts_with("d0/d1/d2/"));
        assert!(docs[0].absolute_path().ends_with("/d19/leaf"));
        assert_eq!(crate::tree::flatten_directories(&root).len(), 21);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("doc"), "x").unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(real.join("doc"), tmp.path().join("alias"))
            .unwrap();

        let root = scan(tmp.path()).unwrap();
        let dirs: Vec<&str> =
            root.directories.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(dirs, vec!["real"]);
        assert_eq!(names(&root), vec!["alias"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = scan(tmp.path()).unwrap();
        assert!(root.documents.is_empty());
        assert!(root.directories.is_empty());
    }
}
