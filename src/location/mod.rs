//! # Locations
//!
//! A [`Location`] is a named or anonymous point in one of the three path
//! namespaces of a nest (see [`Namespace`]). It is either absolute (a literal
//! path) or relative to another named location of the same namespace, and
//! named locations may be declared before they are linked to anything.
//!
//! Every namespace keeps its declarations in a [`LocationTable`]. Entries
//! refer to named locations through a [`LocationRef`], so a link made after an
//! entry was added is still observed when the entry is finally resolved.

pub mod resolver;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{NestError, Result};

pub use resolver::{join_segments, resolve};

/// Path of the distinguished default location.
const DEFAULT_PATH: &str = ".";

/// The three independent location namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Where content is read from when a nest is built.
    Source,
    /// Where content is stored inside the archive.
    Nest,
    /// Where content is written to when a nest is expanded.
    Expand,
}

impl Namespace {
    /// Separator used to join path segments in this namespace.
    pub fn separator(self) -> char {
        match self {
            Namespace::Source | Namespace::Expand => std::path::MAIN_SEPARATOR,
            Namespace::Nest => crate::archive::ENTRY_SEPARATOR,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Namespace::Source => "source",
            Namespace::Nest => "nest",
            Namespace::Expand => "expand",
        })
    }
}

/// A point in a location namespace.
///
/// `path` is absolute when `relative_to` is absent and relative to the named
/// location otherwise. A location with `relative_to` but no `path` denotes
/// its parent exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relative_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

fn required(value: &str, what: &str) -> Result<String> {
    if value.is_empty() {
        return Err(NestError::invalid(format!("{what} is empty")));
    }
    Ok(value.to_owned())
}

impl Location {
    /// The "no explicit location" marker: the natural name is used instead.
    pub fn default_location() -> Self {
        Self {
            name: None,
            relative_to: None,
            path: Some(DEFAULT_PATH.to_owned()),
        }
    }

    /// Anonymous absolute location.
    pub fn at(path: &str) -> Result<Self> {
        Ok(Self {
            name: None,
            relative_to: None,
            path: Some(required(path, "path")?),
        })
    }

    /// Anonymous location relative to a named one.
    pub fn under(relative_to: &str, path: Option<&str>) -> Result<Self> {
        Ok(Self {
            name: None,
            relative_to: Some(required(relative_to, "relative-to location name")?),
            path: path.map(|p| required(p, "path")).transpose()?,
        })
    }

    /// Named location that still has to be linked.
    pub fn named(name: &str) -> Result<Self> {
        Ok(Self {
            name: Some(required(name, "location name")?),
            relative_to: None,
            path: None,
        })
    }

    /// Named absolute location.
    pub fn named_at(name: &str, path: &str) -> Result<Self> {
        let mut location = Self::named(name)?;
        location.path = Some(required(path, "path")?);
        Ok(location)
    }

    /// Named location relative to another named location.
    pub fn named_under(name: &str, relative_to: &str, path: Option<&str>) -> Result<Self> {
        let anonymous = Self::under(relative_to, path)?;
        Ok(Self {
            name: Some(required(name, "location name")?),
            ..anonymous
        })
    }

    /// Rebuilds a location from decoded metadata without argument checks.
    pub(crate) fn from_parts(
        name: Option<String>,
        relative_to: Option<String>,
        path: Option<String>,
    ) -> Self {
        Self {
            name,
            relative_to,
            path,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn relative_to(&self) -> Option<&str> {
        self.relative_to.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.name.is_none() && self.relative_to.is_none() && self.path.as_deref() == Some(DEFAULT_PATH)
    }

    /// A location is linked once it has a path or a relative-to reference.
    pub fn is_linked(&self) -> bool {
        self.path.is_some() || self.relative_to.is_some()
    }

    /// Links an unlinked location. Fails with the previous value otherwise.
    fn link(&mut self, namespace: Namespace, relative_to: Option<String>, path: Option<String>) -> Result<()> {
        if self.is_linked() {
            return Err(NestError::AlreadyLinked {
                namespace,
                name: self.name.clone().unwrap_or_default(),
                previous: self.target_string(),
            });
        }
        self.relative_to = relative_to;
        self.path = path;
        Ok(())
    }

    /// The linked value without the name, e.g. `$BASE/lib`.
    fn target_string(&self) -> String {
        let mut buf = String::new();
        if let Some(rel) = &self.relative_to {
            buf.push('$');
            buf.push_str(rel);
            buf.push('/');
        }
        if let Some(path) = &self.path {
            buf.push_str(path);
        }
        buf
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{name}=")?;
        }
        f.write_str(&self.target_string())
    }
}

/// How an entry refers to a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationRef {
    /// A declared location, looked up by name at resolution time.
    Named(String),
    /// A location owned by the entry itself.
    Inline(Location),
}

impl LocationRef {
    pub fn default_location() -> Self {
        LocationRef::Inline(Location::default_location())
    }

    /// Looks the referenced location up in its namespace table.
    pub fn get<'a>(&'a self, table: &'a LocationTable) -> Result<&'a Location> {
        match self {
            LocationRef::Named(name) => table.require(name),
            LocationRef::Inline(location) => Ok(location),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, LocationRef::Inline(location) if location.is_default())
    }
}

/// Name → location map of a single namespace.
#[derive(Debug, Clone)]
pub struct LocationTable {
    namespace: Namespace,
    locations: BTreeMap<String, Location>,
}

impl LocationTable {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            locations: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Location> {
        self.locations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    /// Like [`get`](Self::get) but fails with `MissingLocation`.
    pub fn require(&self, name: &str) -> Result<&Location> {
        self.locations.get(name).ok_or_else(|| NestError::MissingLocation {
            namespace: self.namespace,
            name: name.to_owned(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// Declares (or re-declares) a named location.
    pub fn declare(&mut self, location: Location) -> Result<()> {
        let name = location
            .name()
            .ok_or_else(|| NestError::invalid(format!("{} location has no name", self.namespace)))?
            .to_owned();
        self.locations.insert(name, location);
        Ok(())
    }

    /// Links a declared location to a literal path.
    pub fn link_path(&mut self, name: &str, path: &str) -> Result<()> {
        let path = required(path, "path")?;
        let namespace = self.namespace;
        self.require_mut(name)?.link(namespace, None, Some(path))
    }

    /// Links a declared location to a path relative to another named location.
    pub fn link_relative(&mut self, name: &str, relative_to: &str, path: Option<&str>) -> Result<()> {
        let relative_to = required(relative_to, "relative-to location name")?;
        let path = path.map(|p| required(p, "path")).transpose()?;
        let namespace = self.namespace;
        self.require_mut(name)?.link(namespace, Some(relative_to), path)
    }

    /// Links `name` to `path`, declaring it first if it is not known yet.
    pub fn declare_or_link_path(&mut self, name: &str, path: &str) -> Result<()> {
        if self.contains(name) {
            self.link_path(name, path)
        } else {
            self.declare(Location::named_at(name, path)?)
        }
    }

    /// Adds the locations whose names are not declared yet. Existing
    /// declarations win. Returns how many were added.
    pub fn merge_missing(&mut self, locations: impl IntoIterator<Item = Location>) -> usize {
        let mut added = 0;
        for location in locations {
            let Some(name) = location.name().map(str::to_owned) else {
                continue;
            };
            if !self.locations.contains_key(&name) {
                self.locations.insert(name, location);
                added += 1;
            }
        }
        added
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut Location> {
        if name.is_empty() {
            return Err(NestError::invalid("location name is empty"));
        }
        let namespace = self.namespace;
        self.locations.get_mut(name).ok_or_else(|| NestError::MissingLocation {
            namespace,
            name: name.to_owned(),
        })
    }
}
