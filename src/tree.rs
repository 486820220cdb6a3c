//! Flattening a directory tree without recursion.
//!
//! Trees built from real file systems can be arbitrarily deep, so both walks
//! keep their pending directories on a heap-allocated stack.

use crate::model::{Directory, Document};

/// Every document in the tree, in no particular order.
pub fn flatten_documents(root: &Directory) -> Vec<&Document> {
    let mut documents: Vec<&Document> = root.documents.iter().collect();
    let mut stack: Vec<&Directory> = root.directories.iter().collect();

    while let Some(dir) = stack.pop() {
        documents.extend(dir.documents.iter());
        stack.extend(dir.directories.iter());
    }
    documents
}

/// Every directory in the tree, `root` included, in no particular order.
pub fn flatten_directories(root: &Directory) -> Vec<&Directory> {
    let mut directories = vec![root];
    let mut stack: Vec<&Directory> = root.directories.iter().collect();

    while let Some(dir) = stack.pop() {
        directories.push(dir);
        stack.extend(dir.directories.iter());
    }
    directories
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn doc(name: &str, path: &str) -> Document {
        Document::new(name, path, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    }

    fn sample() -> Directory {
        Directory::new("C", "C")
            .with_document(doc("n1", "C/n1"))
            .with_directory(
                Directory::new("C/sub", "sub")
                    .with_document(doc("n2", "C/sub/n2")),
            )
    }

    fn paths(docs: Vec<&Document>) -> Vec<&str> {
        let mut paths: Vec<&str> =
            docs.into_iter().map(Document::absolute_path).collect();
        paths.sort();
        paths
    }

    #[test]
    fn flattens_documents() {
        let root = sample();
        assert_eq!(paths(flatten_documents(&root)), vec!["C/n1", "C/sub/n2"]);
    }

    #[test]
    fn flattens_directories_including_root() {
        let root = sample();
        let mut dirs: Vec<&str> = flatten_directories(&root)
            .into_iter()
            .map(|d| d.path.as_str())
            .collect();
        dirs.sort();
        assert_eq!(dirs, vec!["C", "C/sub"]);
    }

    #[test]
    fn empty_root() {
        let root = Directory::new("", "empty");
        assert!(flatten_documents(&root).is_empty());
        assert_eq!(flatten_directories(&root).len(), 1);
    }

    #[test]
    fn deep_tree_does_not_overflow() {
        let depth = 50_000;
        let mut node = Directory::new(format!("d{depth}"), "leaf")
            .with_document(doc("leaf", "leaf"));
        for i in (0..depth).rev() {
            node = Directory::new(format!("d{i}"), format!("d{i}"))
                .with_directory(node);
        }

        assert_eq!(flatten_documents(&node).len(), 1);
        assert_eq!(flatten_directories(&node).len(), depth + 1);

        // Dropping a chain this deep recurses through `Vec<Directory>`;
        // unlink it iteratively instead.
        let mut next = Some(node);
        while let Some(mut dir) = next {
            next = dir.directories.pop();
        }
    }
}
