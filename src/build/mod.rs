//! # Building Nests
//!
//! [`NestBuilder`] is one build session. It owns the source, nest and expand
//! location tables plus the ordered list of entries, and nothing is resolved
//! until [`NestBuilder::build`] runs. Declarations and links can therefore be
//! made in any order relative to the entries that use them.
//!
//! ```no_run
//! # fn main() -> nest::Result<()> {
//! use nest::NestBuilder;
//!
//! let archive = NestBuilder::new()
//!     .name_source_location("HOME")?
//!     .name_nest_location("CONF", "etc")?
//!     .add("/tmp/x/test.txt")?
//!     .under("misc")?
//!     .add_location_path("HOME", "app.toml")?
//!     .under_location("CONF")?
//!     .link_source_location("HOME", "/home/me")?
//!     .build("/tmp/out", "nest.zip")?;
//! # let _ = archive;
//! # Ok(())
//! # }
//! ```

mod pipeline;

use std::path::{Path, PathBuf};

use crate::entry::BuildEntry;
use crate::error::{NestError, Result};
use crate::location::{Location, LocationRef, LocationTable, Namespace};

/// A build session.
#[derive(Debug, Clone)]
pub struct NestBuilder {
    source: LocationTable,
    nest: LocationTable,
    expand: LocationTable,
    entries: Vec<BuildEntry>,
}

impl Default for NestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NestBuilder {
    pub fn new() -> Self {
        Self {
            source: LocationTable::new(Namespace::Source),
            nest: LocationTable::new(Namespace::Nest),
            expand: LocationTable::new(Namespace::Expand),
            entries: Vec::new(),
        }
    }

    /// Declares a source location to be linked later.
    pub fn name_source_location(mut self, name: &str) -> Result<Self> {
        self.source.declare(Location::named(name)?)?;
        Ok(self)
    }

    /// Declares a source location relative to another source location.
    pub fn name_source_location_relative(mut self, name: &str, relative_to: &str, path: &str) -> Result<Self> {
        self.source.declare(Location::named_under(name, relative_to, Some(path))?)?;
        Ok(self)
    }

    /// Links a source location to a path, declaring it if it is new.
    pub fn link_source_location(mut self, name: &str, path: &str) -> Result<Self> {
        self.source.declare_or_link_path(name, path)?;
        Ok(self)
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

    /// Declares an expand location. Its target is left to whoever expands.
    pub fn name_expand_location(mut self, name: &str) -> Result<Self> {
        self.expand.declare(Location::named(name)?)?;
        Ok(self)
    }

    /// Declares an expand location relative to another expand location.
    pub fn name_expand_location_relative(mut self, name: &str, relative_to: &str, path: &str) -> Result<Self> {
        self.expand.declare(Location::named_under(name, relative_to, Some(path))?)?;
        Ok(self)
    }

    /// Links a declared expand location to a default path.
    pub fn link_expand_location(mut self, name: &str, path: &str) -> Result<Self> {
        self.expand.link_path(name, path)?;
        Ok(self)
    }

    /// Adds a file or directory by its literal path.
    pub fn add(self, path: impl AsRef<Path>) -> Result<EntryBuilder> {
        let path = path_str(path.as_ref())?;
        let source = LocationRef::Inline(Location::at(path)?);
        Ok(self.begin(source))
    }

    /// Adds the content of a named source location.
    pub fn add_location(self, name: &str) -> Result<EntryBuilder> {
        if name.is_empty() {
            return Err(NestError::invalid("source location name is empty"));
        }
        Ok(self.begin(LocationRef::Named(name.to_owned())))
    }

    /// Adds `path` relative to a named source location.
    pub fn add_location_path(self, name: &str, path: &str) -> Result<EntryBuilder> {
        let source = LocationRef::Inline(Location::under(name, Some(path))?);
        Ok(self.begin(source))
    }

    fn begin(self, source: LocationRef) -> EntryBuilder {
        EntryBuilder {
            builder: self,
            entry: BuildEntry::new(source),
        }
    }

    /// Entries added so far, in insertion order.
    pub fn entries(&self) -> &[BuildEntry] {
        &self.entries
    }

    /// Writes the nest to `dir/file_name` and returns its path.
    ///
    /// The archive is assembled in a temporary file next to the target and
    /// moved into place only when every entry was written; on failure no
    /// file is left behind.
    pub fn build(&self, dir: impl AsRef<Path>, file_name: &str) -> Result<PathBuf> {
        pipeline::build(self, dir.as_ref(), file_name)
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| NestError::invalid(format!("path '{}' is not valid UTF-8", path.display())))
}

/// The entry being added to a [`NestBuilder`].
///
/// Only target setters are available until the entry is finished, either
/// explicitly with [`done`](Self::done) or implicitly by adding the next entry
/// or building.
#[derive(Debug)]
pub struct EntryBuilder {
    builder: NestBuilder,
    entry: BuildEntry,
}

impl EntryBuilder {
    /// Stores the entry under a literal in-archive path.
    pub fn under(self, nest_path: &str) -> Result<Self> {
        let nest = LocationRef::Inline(Location::at(nest_path)?);
        self.with_nest(nest)
    }

    /// Stores the entry under a named nest location.
    pub fn under_location(self, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(NestError::invalid("nest location name is empty"));
        }
        self.with_nest(LocationRef::Named(name.to_owned()))
    }

    /// Stores the entry under `path` relative to a named nest location.
    pub fn under_location_path(self, name: &str, path: &str) -> Result<Self> {
        let nest = LocationRef::Inline(Location::under(name, Some(path))?);
        self.with_nest(nest)
    }

    /// Records a named expand location as the entry's default destination.
    pub fn expand_to_location(self, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(NestError::invalid("expand location name is empty"));
        }
        self.with_expand(LocationRef::Named(name.to_owned()))
    }

    /// Records `path` under a named expand location as the entry's default destination.
    pub fn expand_to_location_path(self, name: &str, path: &str) -> Result<Self> {
        let expand = LocationRef::Inline(Location::under(name, Some(path))?);
        self.with_expand(expand)
    }

    fn with_nest(mut self, nest: LocationRef) -> Result<Self> {
        if !self.entry.nest.is_default() {
            return Err(NestError::invalid("entry already has a nest location"));
        }
        self.entry.nest = nest;
        Ok(self)
    }

    fn with_expand(mut self, expand: LocationRef) -> Result<Self> {
        if self.entry.expand.is_some() {
            return Err(NestError::invalid("entry already has an expand location"));
        }
        self.entry.expand = Some(expand);
        Ok(self)
    }

    /// Finishes the entry and returns to the session.
    pub fn done(self) -> NestBuilder {
        let mut builder = self.builder;
        builder.entries.push(self.entry);
        builder
    }

    pub fn add(self, path: impl AsRef<Path>) -> Result<EntryBuilder> {
        self.done().add(path)
    }

    pub fn add_location(self, name: &str) -> Result<EntryBuilder> {
        self.done().add_location(name)
    }

    pub fn add_location_path(self, name: &str, path: &str) -> Result<EntryBuilder> {
        self.done().add_location_path(name, path)
    }

    pub fn name_source_location(self, name: &str) -> Result<NestBuilder> {
        self.done().name_source_location(name)
    }

    pub fn link_source_location(self, name: &str, path: &str) -> Result<NestBuilder> {
        self.done().link_source_location(name, path)
    }

    pub fn name_nest_location(self, name: &str, path: &str) -> Result<NestBuilder> {
        self.done().name_nest_location(name, path)
    }

    pub fn link_expand_location(self, name: &str, path: &str) -> Result<NestBuilder> {
        self.done().link_expand_location(name, path)
    }

    pub fn build(self, dir: impl AsRef<Path>, file_name: &str) -> Result<PathBuf> {
        self.done().build(dir, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_insertion_order_and_targets() {
        let builder = NestBuilder::new()
            .add("/tmp/x/test.txt")
            .unwrap()
            .under("misc")
            .unwrap()
            .add_location_path("HOME", "a")
            .unwrap()
            .under_location("BASE")
            .unwrap()
            .expand_to_location("CONF")
            .unwrap()
            .done();

        let entries = builder.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].nest,
            LocationRef::Inline(Location::at("misc").unwrap())
        );
        assert_eq!(entries[1].nest, LocationRef::Named("BASE".into()));
        assert_eq!(entries[1].expand, Some(LocationRef::Named("CONF".into())));
    }

    #[test]
    fn targets_are_set_once_per_entry() {
        let err = NestBuilder::new()
            .add("/tmp/x")
            .unwrap()
            .under("a")
            .unwrap()
            .under_location("B")
            .unwrap_err();
        assert!(matches!(err, NestError::InvalidArgument(_)));
    }

    #[test]
    fn source_link_declares_when_absent() {
        // link after use, and link of a name never declared
        let builder = NestBuilder::new()
            .name_source_location("A")
            .unwrap()
            .add_location("A")
            .unwrap()
            .link_source_location("A", "/src/a")
            .unwrap()
            .link_source_location("B", "/src/b")
            .unwrap();
        assert_eq!(builder.source.get("A").unwrap().path(), Some("/src/a"));
        assert_eq!(builder.source.get("B").unwrap().path(), Some("/src/b"));
        assert!(matches!(
            builder.link_source_location("B", "/src/b"),
            Err(NestError::AlreadyLinked { .. })
        ));
    }

    #[test]
    fn empty_arguments_fail_at_the_call_site() {
        assert!(NestBuilder::new().add("").is_err());
        assert!(NestBuilder::new().add_location("").is_err());
        assert!(NestBuilder::new().name_nest_location("N", "").is_err());
    }
}
