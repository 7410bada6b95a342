//! Pairings of locations that describe a single item of a nest.

use crate::error::{NestError, Result};
use crate::location::{Location, LocationRef, LocationTable, Namespace};

/// One item added to a build: where it comes from and where it is stored.
#[derive(Debug, Clone)]
pub struct BuildEntry {
    /// Location in the source namespace.
    pub source: LocationRef,
    /// Location in the nest namespace; the default stores the item at the root.
    pub nest: LocationRef,
    /// Optional expand-namespace target recorded for the expanding side.
    pub expand: Option<LocationRef>,
}

impl BuildEntry {
    pub fn new(source: LocationRef) -> Self {
        Self {
            source,
            nest: LocationRef::default_location(),
            expand: None,
        }
    }

    /// The nest location written into the entry breadcrumb, if it carries
    /// anything beyond a literal path.
    pub fn breadcrumb<'a>(&'a self, nest_table: &'a LocationTable) -> Result<Option<&'a Location>> {
        let location = self.nest.get(nest_table)?;
        if location.name().is_some() || location.relative_to().is_some() {
            Ok(Some(location))
        } else {
            Ok(None)
        }
    }
}

/// The expand-side links of a session: nest location name → expand target.
#[derive(Debug, Clone, Default)]
pub struct ExpandLinks {
    links: Vec<(String, LocationRef)>,
}

impl ExpandLinks {
    /// Links a nest location to an expand target, exactly once.
    pub fn link(&mut self, nest_location: &str, target: LocationRef) -> Result<()> {
        if nest_location.is_empty() {
            return Err(NestError::invalid("nest location name is empty"));
        }
        if let Some(previous) = self.get(nest_location) {
            return Err(NestError::AlreadyLinked {
                namespace: Namespace::Nest,
                name: nest_location.to_owned(),
                previous: describe(previous),
            });
        }
        self.links.push((nest_location.to_owned(), target));
        Ok(())
    }

    pub fn get(&self, nest_location: &str) -> Option<&LocationRef> {
        self.links
            .iter()
            .find(|(name, _)| name == nest_location)
            .map(|(_, target)| target)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

fn describe(target: &LocationRef) -> String {
    match target {
        LocationRef::Named(name) => format!("${name}"),
        LocationRef::Inline(location) => location.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nest_location_links_once() {
        let mut links = ExpandLinks::default();
        links
            .link("DIR_A", LocationRef::Inline(Location::at("dirs/dir_a").unwrap()))
            .unwrap();
        let err = links
            .link("DIR_A", LocationRef::Named("EXPAND_DIRS".into()))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "nest location 'DIR_A' is already linked to 'dirs/dir_a'"
        );
        assert_eq!(links.names().collect::<Vec<_>>(), ["DIR_A"]);
    }

    #[test]
    fn literal_nest_paths_leave_no_breadcrumb() {
        let table = LocationTable::new(Namespace::Nest);
        let mut entry = BuildEntry::new(LocationRef::Inline(Location::at("/tmp/x").unwrap()));
        assert!(entry.breadcrumb(&table).unwrap().is_none());

        entry.nest = LocationRef::Inline(Location::at("misc").unwrap());
        assert!(entry.breadcrumb(&table).unwrap().is_none());

        entry.nest = LocationRef::Inline(Location::under("BASE", Some("lib")).unwrap());
        assert_eq!(
            entry.breadcrumb(&table).unwrap().map(ToString::to_string).as_deref(),
            Some("$BASE/lib")
        );
    }
}
