#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use nest::archive::NestReader;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Creates a file (and its parents) whose content is derived from its name.
pub fn new_file(dir: &Path, name: &str) -> io::Result<std::path::PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, format!("content of {name}\n"))?;
    Ok(path)
}

pub fn mkdir(dir: &Path, name: &str) -> io::Result<std::path::PathBuf> {
    let path = dir.join(name);
    fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Entry names of a nest in container order, the root placeholder included.
pub fn entry_names(archive: &Path) -> Vec<String> {
    let mut reader = NestReader::open(archive).expect("open nest");
    reader
        .metas()
        .expect("read entries")
        .into_iter()
        .map(|meta| meta.name)
        .collect()
}

/// A directory tree as relative path → content digest (`None` for directories).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tree(BTreeMap<String, Option<String>>);

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything below `root`.
    pub fn read(root: &Path) -> Self {
        let mut tree = Self::new();
        for item in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let item = item.expect("walk tree");
            let rel = item
                .path()
                .strip_prefix(root)
                .expect("inside root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let digest = if item.file_type().is_dir() {
                None
            } else {
                Some(sha256_hex(&fs::read(item.path()).expect("read file")))
            };
            tree.0.insert(rel, digest);
        }
        tree
    }

    /// Adds a directory and its ancestors.
    pub fn dir(mut self, rel: &str) -> Self {
        self.add_ancestors(rel);
        self.0.insert(rel.trim_end_matches('/').to_owned(), None);
        self
    }

    /// Adds a file with the content of `source`.
    pub fn file(mut self, rel: &str, source: &Path) -> Self {
        self.add_ancestors(rel);
        let digest = sha256_hex(&fs::read(source).expect("read source"));
        self.0.insert(rel.to_owned(), Some(digest));
        self
    }

    /// Adds a copy of the tree at `source` under `rel`, keeping only the
    /// paths (relative to `source`) accepted by `keep`.
    pub fn subtree(mut self, rel: &str, source: &Path, keep: impl Fn(&str) -> bool) -> Self {
        self = self.dir(rel);
        for (path, digest) in Self::read(source).0 {
            if keep(&path) {
                self.0.insert(format!("{rel}/{path}"), digest);
            }
        }
        self
    }

    fn add_ancestors(&mut self, rel: &str) {
        let rel = rel.trim_end_matches('/');
        let mut prefix = String::new();
        let segments: Vec<&str> = rel.split('/').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            self.0.insert(prefix.clone(), None);
        }
    }
}
