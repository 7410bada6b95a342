//! Read-only inspection of a nest.

use std::path::Path;

use serde::Serialize;

use super::metadata::{ArchiveMetadata, EntryMetadata};
use crate::archive::NestReader;
use crate::error::Result;
use crate::location::Location;

/// One stored entry as shown by `nest list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    /// Nest location the entry was stored under, if it was not a literal path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Expand target recorded at build time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_target: Option<Location>,
}

/// Everything a nest records about itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NestListing {
    pub nest_locations: Vec<Location>,
    pub expand_locations: Vec<Location>,
    pub entries: Vec<ListedEntry>,
}

/// Lists the real entries of a nest, in container order, together with the
/// location declarations recorded in it.
pub fn list_entries(archive: &Path) -> Result<NestListing> {
    let mut reader = NestReader::open(archive)?;
    let recorded = ArchiveMetadata::decode(reader.root_attachment()?.as_deref())?;

    let mut entries = Vec::with_capacity(reader.len());
    for meta in reader.metas()? {
        if meta.is_root() {
            continue;
        }
        let side = EntryMetadata::decode(meta.attachment.as_deref())?;
        entries.push(ListedEntry {
            name: meta.name,
            is_dir: meta.is_dir,
            size: meta.size,
            location: side.location,
            expand_target: side.expand_target,
        });
    }

    Ok(NestListing {
        nest_locations: recorded.nest_locations,
        expand_locations: recorded.expand_locations,
        entries,
    })
}
