//! # Expanding Nests
//!
//! [`NestExpander`] opens an existing nest and writes its content under a base
//! directory. Before expanding, the caller may declare nest and expand
//! locations of its own and link nest locations (or plain nest paths) to
//! expansion targets. Declarations recorded in the archive are merged in at
//! expansion time, and the caller's declarations take precedence.
//!
//! Expansion is not transactional: if it fails halfway, whatever was written
//! so far stays on disk.

mod listing;
pub(crate) mod metadata;
mod paths;

pub use listing::{list_entries, ListedEntry, NestListing};

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::archive::{EntryMeta, NestReader, ENTRY_SEPARATOR};
use crate::entry::ExpandLinks;
use crate::error::{IoResultExt, NestError, Result};
use crate::fsx;
use crate::location::{Location, LocationRef, LocationTable, Namespace};
use metadata::{ArchiveMetadata, EntryMetadata};
use paths::{cache_key, resolve_expand_target, ExpandPaths};

/// What an expansion wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpandSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// An expand session over one nest.
#[derive(Debug, Clone)]
pub struct NestExpander {
    archive: PathBuf,
    nest: LocationTable,
    expand: LocationTable,
    links: ExpandLinks,
}

impl NestExpander {
    /// Opens a session over an existing nest. The archive itself is read only
    /// by [`expand`](Self::expand).
    pub fn open(archive: impl AsRef<Path>) -> Result<Self> {
        let archive = archive.as_ref();
        match fsx::metadata_if_exists(archive)? {
            Some(meta) if meta.is_file() => {}
            Some(_) => {
                return Err(NestError::Expand(format!("'{}' is not a file", archive.display())));
            }
            None => {
                return Err(NestError::Expand(format!("'{}' does not exist", archive.display())));
            }
        }
        Ok(Self {
            archive: archive.to_path_buf(),
            nest: LocationTable::new(Namespace::Nest),
            expand: LocationTable::new(Namespace::Expand),
            links: ExpandLinks::default(),
        })
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Declares a nest location at a literal in-archive path.
    pub fn name_nest_location(mut self, name: &str, path: &str) -> Result<Self> {
        self.nest.declare(Location::named_at(name, path)?)?;
        Ok(self)
    }

    /// Declares a nest location relative to another nest location.
    pub fn name_nest_location_relative(mut self, name: &str, relative_to: &str, path: &str) -> Result<Self> {
        self.nest.declare(Location::named_under(name, relative_to, Some(path))?)?;
        Ok(self)
    }

    /// Declares an expand location to be linked later.
    pub fn name_expand_location(mut self, name: &str) -> Result<Self> {
        self.expand.declare(Location::named(name)?)?;
        Ok(self)
    }

    /// Declares an expand location relative to another expand location.
    pub fn name_expand_location_relative(mut self, name: &str, relative_to: &str, path: &str) -> Result<Self> {
        self.expand.declare(Location::named_under(name, relative_to, Some(path))?)?;
        Ok(self)
    }

    /// Links a declared expand location to a path; relative paths are taken
    /// from the base directory.
    pub fn link_expand_location(mut self, name: &str, path: &str) -> Result<Self> {
        self.expand.link_path(name, path)?;
        Ok(self)
    }

    /// Links a declared expand location relative to another expand location.
    pub fn link_expand_location_relative(mut self, name: &str, relative_to: &str, path: &str) -> Result<Self> {
        self.expand.link_relative(name, relative_to, Some(path))?;
        Ok(self)
    }

    /// Starts linking a named nest location to an expansion target.
    pub fn link_nest_location(self, name: &str) -> Result<LinkBuilder> {
        if name.is_empty() {
            return Err(NestError::invalid("nest location name is empty"));
        }
        Ok(LinkBuilder {
            expander: self,
            nest_location: name.to_owned(),
        })
    }

    /// Starts linking a literal nest path. The path is declared as a nest
    /// location named after itself.
    pub fn link_nest_path(self, nest_path: &str) -> Result<LinkBuilder> {
        let expander = self.name_nest_location(nest_path, nest_path)?;
        expander.link_nest_location(nest_path)
    }

    /// Starts linking `path` under a named nest location. The pair is declared
    /// as a nest location named `$NAME/path`.
    pub fn link_nest_path_relative(self, nest_location: &str, path: &str) -> Result<LinkBuilder> {
        if nest_location.is_empty() || path.is_empty() {
            return Err(NestError::invalid("nest location name and path must not be empty"));
        }
        let name = format!("${nest_location}{ENTRY_SEPARATOR}{path}");
        let expander = self.name_nest_location_relative(&name, nest_location, path)?;
        expander.link_nest_location(&name)
    }

    /// Expands the nest under `base`, creating it if needed.
    pub fn expand(mut self, base: impl AsRef<Path>) -> Result<ExpandSummary> {
        let base = base.as_ref();
        if fsx::metadata_if_exists(base)?.is_some_and(|meta| !meta.is_dir()) {
            return Err(NestError::Expand(format!("'{}' is not a directory", base.display())));
        }

        let mut reader = NestReader::open(&self.archive)?;

        let recorded = ArchiveMetadata::decode(reader.root_attachment()?.as_deref())?;
        let nest_added = self.nest.merge_missing(recorded.nest_locations);
        let expand_added = self.expand.merge_missing(recorded.expand_locations);
        debug!(
            archive = %self.archive.display(),
            nest_locations = nest_added,
            expand_locations = expand_added,
            "merged recorded locations"
        );

        // decode every entry up front so malformed metadata fails before any write
        let mut entries = Vec::with_capacity(reader.len());
        for meta in reader.metas()? {
            if meta.is_root() {
                continue;
            }
            check_entry_name(&meta.name)?;
            let side = EntryMetadata::decode(meta.attachment.as_deref())?;
            if let Some(location) = side.location.clone().filter(|l| l.name().is_some()) {
                self.nest.merge_missing([location]);
            }
            entries.push((meta, side));
        }

        let mut paths = ExpandPaths::new(base);
        paths.plan(&self.nest, &self.expand, &self.links)?;
        self.map_recorded_targets(&mut paths, &entries, base)?;

        fs::create_dir_all(base).at_path(base)?;
        let mut summary = ExpandSummary::default();
        let mut dir_modes = Vec::new();
        for (meta, _) in &entries {
            let target = paths.expand_path(&meta.name, meta.is_dir);
            if meta.is_dir {
                fs::create_dir_all(&target).at_path(&target)?;
                if let Some(mode) = meta.mode {
                    dir_modes.push((target, mode));
                }
                summary.directories += 1;
            } else {
                summary.bytes += write_entry(&mut reader, meta, &target)?;
                summary.files += 1;
            }
        }
        // directories last so read-only ones do not block their children
        for (dir, mode) in dir_modes.iter().rev() {
            fsx::set_unix_permissions(dir, *mode).at_path(dir)?;
        }

        info!(
            archive = %self.archive.display(),
            base = %base.display(),
            directories = summary.directories,
            files = summary.files,
            bytes = summary.bytes,
            "nest expanded"
        );
        Ok(summary)
    }

    /// Maps entries to the expand targets recorded at build time, where the
    /// nest path is not mapped yet and the target resolves.
    fn map_recorded_targets(
        &self,
        paths: &mut ExpandPaths,
        entries: &[(EntryMeta, EntryMetadata)],
        base: &Path,
    ) -> Result<()> {
        for (meta, side) in entries {
            let Some(recorded) = &side.expand_target else {
                continue;
            };
            if paths.contains(&meta.name) {
                continue;
            }
            let location = match recorded.name().and_then(|name| self.expand.get(name)) {
                Some(declared) => declared,
                None => recorded,
            };
            match resolve_expand_target(location, &self.expand, base) {
                Ok(target) => {
                    debug!(entry = %meta.name, target = %target.display(), "using recorded expand target");
                    paths.insert(&meta.name, target);
                }
                Err(e @ (NestError::UnlinkedLocation { .. } | NestError::MissingLocation { .. })) => {
                    debug!(entry = %meta.name, reason = %e, "recorded expand target not resolvable, keeping natural place");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Rejects entry names that would land outside the base directory.
fn check_entry_name(name: &str) -> Result<()> {
    let escapes = name.starts_with(ENTRY_SEPARATOR)
        || name.contains('\\')
        || cache_key(name).split(ENTRY_SEPARATOR).any(|segment| segment == "..");
    if escapes {
        return Err(NestError::Expand(format!("entry '{name}' escapes the expansion directory")));
    }
    Ok(())
}

fn write_entry(reader: &mut NestReader, meta: &EntryMeta, target: &Path) -> Result<u64> {
    fsx::ensure_parent_dir(target)?;
    let file = File::create(target).at_path(target)?;
    let mut out = BufWriter::new(file);
    let copied = reader.copy_to(meta.index, &mut out).map_err(|e| match e {
        NestError::Io { source, .. } => NestError::io(source, target),
        other => other,
    })?;
    out.flush().at_path(target)?;
    if let Some(mode) = meta.mode {
        fsx::set_unix_permissions(target, mode).at_path(target)?;
    }
    debug!(entry = %meta.name, target = %target.display(), bytes = copied, "expanded file");
    Ok(copied)
}

/// Links one nest location to its expansion target.
#[derive(Debug)]
pub struct LinkBuilder {
    expander: NestExpander,
    nest_location: String,
}

impl LinkBuilder {
    /// Links to a path; relative paths are taken from the base directory.
    pub fn to_path(self, path: &str) -> Result<NestExpander> {
        let target = LocationRef::Inline(Location::at(path)?);
        self.finish(target)
    }

    /// Links to `path` under a named expand location.
    pub fn to_location_path(self, expand_location: &str, path: &str) -> Result<NestExpander> {
        let target = LocationRef::Inline(Location::under(expand_location, Some(path))?);
        self.finish(target)
    }

    /// Links to a named expand location.
    pub fn to_location(self, expand_location: &str) -> Result<NestExpander> {
        if expand_location.is_empty() {
            return Err(NestError::invalid("expand location name is empty"));
        }
        self.finish(LocationRef::Named(expand_location.to_owned()))
    }

    fn finish(self, target: LocationRef) -> Result<NestExpander> {
        let mut expander = self.expander;
        expander.links.link(&self.nest_location, target)?;
        Ok(expander)
    }
}
