//! Decoding of the location metadata recorded in a nest.

use crate::attachment::records::decode_locations;
use crate::attachment::{
    self, ENTRY_EXPAND_TARGET, ENTRY_HANDLERS, ENTRY_LOCATIONS, EXPAND_LOCATIONS, NEST_HANDLERS, NEST_LOCATIONS,
};
use crate::error::{NestError, Result};
use crate::location::Location;

/// Declarations carried by the root placeholder.
#[derive(Debug, Default)]
pub(crate) struct ArchiveMetadata {
    pub nest_locations: Vec<Location>,
    pub expand_locations: Vec<Location>,
}

impl ArchiveMetadata {
    pub(crate) fn decode(block: Option<&[u8]>) -> Result<Self> {
        let mut out = Self::default();
        let Some(block) = block else {
            return Ok(out);
        };
        for record in attachment::decode(block, NEST_HANDLERS)? {
            let locations = decode_locations(&record.payload)?;
            match record.id.as_str() {
                NEST_LOCATIONS => out.nest_locations.extend(locations),
                EXPAND_LOCATIONS => out.expand_locations.extend(locations),
                other => return Err(NestError::UnrecognizedHandlerId(other.to_owned())),
            }
        }
        Ok(out)
    }
}

/// Side data of a single entry.
#[derive(Debug, Default)]
pub(crate) struct EntryMetadata {
    /// Nest location the entry was stored under.
    pub location: Option<Location>,
    /// Expand target recorded when the nest was built.
    pub expand_target: Option<Location>,
}

impl EntryMetadata {
    pub(crate) fn decode(block: Option<&[u8]>) -> Result<Self> {
        let mut out = Self::default();
        let Some(block) = block else {
            return Ok(out);
        };
        for record in attachment::decode(block, ENTRY_HANDLERS)? {
            let location = decode_locations(&record.payload)?.into_iter().next();
            match record.id.as_str() {
                ENTRY_LOCATIONS => out.location = location,
                ENTRY_EXPAND_TARGET => out.expand_target = location,
                other => return Err(NestError::UnrecognizedHandlerId(other.to_owned())),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::records::encode_locations;

    #[test]
    fn archive_block_splits_namespaces() {
        let nest = Location::named_at("CONF", "etc").unwrap();
        let expand = Location::named("TARGET").unwrap();
        let block = attachment::encode([
            (NEST_LOCATIONS, encode_locations([&nest]).unwrap()),
            (EXPAND_LOCATIONS, encode_locations([&expand]).unwrap()),
        ])
        .unwrap()
        .unwrap();

        let meta = ArchiveMetadata::decode(Some(block.as_slice())).unwrap();
        assert_eq!(meta.nest_locations, vec![nest]);
        assert_eq!(meta.expand_locations, vec![expand]);
        assert!(ArchiveMetadata::decode(None).unwrap().nest_locations.is_empty());
    }

    #[test]
    fn entry_ids_are_not_accepted_at_archive_level() {
        let crumb = Location::under("CONF", Some("x")).unwrap();
        let block = attachment::encode([(ENTRY_LOCATIONS, encode_locations([&crumb]).unwrap())])
            .unwrap()
            .unwrap();
        assert!(matches!(
            ArchiveMetadata::decode(Some(block.as_slice())),
            Err(NestError::UnrecognizedHandlerId(_))
        ));
        let entry = EntryMetadata::decode(Some(block.as_slice())).unwrap();
        assert_eq!(entry.location, Some(crumb));
        assert_eq!(entry.expand_target, None);
    }
}
