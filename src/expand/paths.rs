//! Nest path → expansion path mapping.
//!
//! The map is seeded before any byte is written: every nest location the
//! caller linked gets its expand target, then the expand targets recorded at
//! build time fill the gaps. Stored entries missing from the map resolve
//! through their parent directory, recursively up to the archive root, so a
//! re-targeted directory carries its whole subtree along. The first mapping
//! recorded for a nest path wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::ENTRY_SEPARATOR;
use crate::entry::ExpandLinks;
use crate::error::Result;
use crate::location::{resolve, Location, LocationTable};

/// Normalized cache key of a nest path: no leading or trailing separator.
/// `.` and `/` both name the archive root, whose key is `""`.
pub(crate) fn cache_key(nest_path: &str) -> &str {
    match nest_path.trim_matches(ENTRY_SEPARATOR) {
        "." => "",
        key => key.strip_prefix("./").unwrap_or(key),
    }
}

/// Appends the segments of a relative nest path to a filesystem path.
pub(crate) fn join_nest_path(dir: &Path, nest_path: &str) -> PathBuf {
    nest_path
        .split(ENTRY_SEPARATOR)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .fold(dir.to_path_buf(), |acc, segment| acc.join(segment))
}

/// Resolves an expand-namespace location to a path under `base`.
///
/// Absolute results stay absolute; the default location is `base` itself.
pub(crate) fn resolve_expand_target(location: &Location, table: &LocationTable, base: &Path) -> Result<PathBuf> {
    Ok(match resolve(location, table)? {
        Some(path) => base.join(path),
        None => base.to_path_buf(),
    })
}

#[derive(Debug)]
pub(crate) struct ExpandPaths {
    base: PathBuf,
    mapped: HashMap<String, PathBuf>,
}

impl ExpandPaths {
    pub(crate) fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            mapped: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.mapped.len()
    }

    pub(crate) fn contains(&self, nest_path: &str) -> bool {
        self.mapped.contains_key(cache_key(nest_path))
    }

    /// Records a mapping unless the nest path is already mapped. Returns the
    /// mapping in effect.
    pub(crate) fn insert(&mut self, nest_path: &str, expand_path: PathBuf) -> PathBuf {
        self.mapped
            .entry(cache_key(nest_path).to_owned())
            .or_insert(expand_path)
            .clone()
    }

    /// The expansion path of a stored entry. Directory results are cached so
    /// that their children reuse them.
    pub(crate) fn expand_path(&mut self, nest_path: &str, is_dir: bool) -> PathBuf {
        let key = cache_key(nest_path);
        if let Some(path) = self.mapped.get(key) {
            return path.clone();
        }
        let path = match key.rsplit_once(ENTRY_SEPARATOR) {
            Some((parent, last)) => self.expand_path(parent, false).join(last),
            None if key.is_empty() => self.base.clone(),
            // top-level entries hang off the archive root, which may be linked
            None => {
                let root = self.mapped.get("").unwrap_or(&self.base);
                join_nest_path(root, key)
            }
        };
        if is_dir {
            self.mapped.insert(key.to_owned(), path.clone());
        }
        path
    }

    /// Maps every nest location the caller linked to its expand target.
    ///
    /// Links are recorded in the order they were made. Unlinked locations are
    /// not mapped: their entries follow the nearest mapped ancestor, so a
    /// linked directory keeps its whole subtree. Every declared nest location
    /// is still resolved here, so cycles and missing parents fail before any
    /// byte is written.
    pub(crate) fn plan(&mut self, nest: &LocationTable, expand: &LocationTable, links: &ExpandLinks) -> Result<()> {
        for name in nest.names() {
            nest_path_of(nest, name)?;
        }
        for name in links.names() {
            let nest_path = nest_path_of(nest, name)?;
            let Some(target) = links.get(name) else {
                continue;
            };
            let expand_path = resolve_expand_target(target.get(expand)?, expand, &self.base)?;
            let mapped = self.insert(&nest_path, expand_path);
            debug!(location = name, nest_path = %nest_path, expand_path = %mapped.display(), "mapped nest location");
        }
        Ok(())
    }
}

/// In-archive path of a declared nest location; the archive root is `""`.
fn nest_path_of(nest: &LocationTable, name: &str) -> Result<String> {
    Ok(resolve(nest.require(name)?, nest)?.unwrap_or_default())
}
