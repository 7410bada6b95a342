//! Resolution of a location to a concrete path string.

use super::{Location, LocationTable};
use crate::error::{NestError, Result};

/// Resolves `location` against its namespace table.
///
/// Returns `Ok(None)` for the default location (and for chains that bottom
/// out in it), meaning the caller should substitute the natural name.
/// Relative chains are joined with the namespace separator. Every name
/// visited during one call is remembered; meeting one again fails with
/// [`NestError::CyclicLocation`].
pub fn resolve(location: &Location, table: &LocationTable) -> Result<Option<String>> {
    let mut chain = Vec::new();
    resolve_chain(location, table, &mut chain)
}

fn resolve_chain(location: &Location, table: &LocationTable, chain: &mut Vec<String>) -> Result<Option<String>> {
    if location.is_default() {
        return Ok(None);
    }

    if let Some(name) = location.name() {
        let seen = chain.iter().any(|n| n == name);
        chain.push(name.to_owned());
        if seen {
            return Err(NestError::CyclicLocation {
                namespace: table.namespace(),
                chain: chain.clone(),
            });
        }
    }

    let Some(parent_name) = location.relative_to() else {
        return match location.path() {
            Some(path) => Ok(Some(path.to_owned())),
            None => Err(NestError::UnlinkedLocation {
                namespace: table.namespace(),
                name: location.name().unwrap_or("<anonymous>").to_owned(),
            }),
        };
    };

    let parent = table.require(parent_name)?;
    let resolved = resolve_chain(parent, table, chain)?;
    let sep = table.namespace().separator();
    Ok(match (resolved, location.path()) {
        (None, path) => path.map(str::to_owned),
        (Some(parent), None) => Some(parent),
        (Some(parent), Some(path)) => Some(join_segments(&parent, path, sep)),
    })
}

/// Joins two path strings with `sep` without doubling the separator.
pub fn join_segments(parent: &str, child: &str, sep: char) -> String {
    let child = child.trim_start_matches(sep);
    if child.is_empty() {
        return parent.to_owned();
    }
    if parent.is_empty() {
        return child.to_owned();
    }
    let trimmed = parent.trim_end_matches(sep);
    if trimmed.is_empty() {
        // parent is the root
        return format!("{sep}{child}");
    }
    format!("{trimmed}{sep}{child}")
}
