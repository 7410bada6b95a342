//! Location records carried inside attachment payloads.
//!
//! A payload is a flat list of `(tag, string)` pairs. `NAME` opens a new
//! record; `RELATIVE_TO` and `PATH` fill in the current one. Breadcrumbs of
//! anonymous locations simply start with `RELATIVE_TO` or `PATH`.

use super::{write_utf, ByteReader};
use crate::error::{NestError, Result};
use crate::location::Location;

const NAME: u8 = 0;
const RELATIVE_TO: u8 = 1;
const PATH: u8 = 2;

/// Serializes locations; `None` when there is nothing to write.
pub fn encode_locations<'a, I>(locations: I) -> Result<Option<Vec<u8>>>
where
    I: IntoIterator<Item = &'a Location>,
{
    let mut buf = Vec::new();
    for location in locations {
        if let Some(name) = location.name() {
            buf.push(NAME);
            write_utf(&mut buf, name)?;
        }
        if let Some(rel) = location.relative_to() {
            buf.push(RELATIVE_TO);
            write_utf(&mut buf, rel)?;
        }
        if let Some(path) = location.path() {
            buf.push(PATH);
            write_utf(&mut buf, path)?;
        }
    }
    Ok((!buf.is_empty()).then_some(buf))
}

#[derive(Default)]
struct Pending {
    name: Option<String>,
    relative_to: Option<String>,
    path: Option<String>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.relative_to.is_none() && self.path.is_none()
    }

    fn finish(self) -> Location {
        Location::from_parts(self.name, self.relative_to, self.path)
    }
}

/// Parses a payload written by [`encode_locations`].
pub fn decode_locations(bytes: &[u8]) -> Result<Vec<Location>> {
    let mut reader = ByteReader::new(bytes);
    let mut out = Vec::new();
    let mut current = Pending::default();

    while !reader.is_at_end() {
        let tag = reader.read_u8()?;
        let value = reader
            .read_utf()?
            .ok_or_else(|| NestError::MalformedAttachment(format!("location property {tag} has no value")))?;
        match tag {
            NAME => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current).finish());
                }
                current.name = Some(value);
            }
            RELATIVE_TO => current.relative_to = Some(value),
            PATH => current.path = Some(value),
            other => {
                return Err(NestError::MalformedAttachment(format!(
                    "unexpected location property type code {other}"
                )))
            }
        }
    }
    if !current.is_empty() {
        out.push(current.finish());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_keep_their_shape() {
        let locations = vec![
            Location::named_at("BASE", "base-a").unwrap(),
            Location::named_under("ETC", "BASE", Some("etc")).unwrap(),
            Location::named("LATER").unwrap(),
        ];
        let bytes = encode_locations(&locations).unwrap().unwrap();
        assert_eq!(decode_locations(&bytes).unwrap(), locations);
    }

    #[test]
    fn anonymous_breadcrumb() {
        let crumb = Location::under("BASE", Some("lib")).unwrap();
        let bytes = encode_locations([&crumb]).unwrap().unwrap();
        assert_eq!(bytes[0], RELATIVE_TO);
        assert_eq!(decode_locations(&bytes).unwrap(), vec![crumb]);
    }

    #[test]
    fn no_locations_no_payload() {
        assert_eq!(encode_locations(&Vec::new()).unwrap(), None);
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let bytes = [9u8, 0, 1, b'x'];
        assert!(matches!(
            decode_locations(&bytes),
            Err(NestError::MalformedAttachment(_))
        ));
    }
}
