//! # Nest Container
//!
//! A nest is a plain ZIP archive. This module is the thin layer between the
//! build/expand pipelines and the `zip` crate:
//!
//! - Directory entries end with [`ENTRY_SEPARATOR`] and carry no content.
//! - Attachments live in the ZIP extra field, wrapped in one or more blocks
//!   tagged with [`EXTRA_FIELD_ID`]. Foreign extra-field blocks are ignored
//!   when reading.
//! - Archive-level metadata is attached to the reserved [`ROOT_ENTRY_NAME`]
//!   entry, which is written first and only when there is metadata to carry.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{IoResultExt, NestError, Result};

/// Separator of in-archive paths.
pub const ENTRY_SEPARATOR: char = '/';

/// Name of the placeholder entry that carries the archive-level attachment.
/// No relative path produced by a build can collide with it.
pub const ROOT_ENTRY_NAME: &str = "./";

/// Extra-field header id of attachment blocks ("NS").
pub const EXTRA_FIELD_ID: u16 = 0x4E53;

const BLOCK_HEADER_LEN: usize = 4;
const MAX_EXTRA_FIELD_LEN: usize = u16::MAX as usize;

const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Wraps an encoded attachment into extra-field blocks.
pub fn frame_extra(attachment: &[u8]) -> Result<Vec<u8>> {
    let max_chunk = MAX_EXTRA_FIELD_LEN - BLOCK_HEADER_LEN;
    let chunks = attachment.len().div_ceil(max_chunk).max(1);
    let framed_len = attachment.len() + chunks * BLOCK_HEADER_LEN;
    if framed_len > MAX_EXTRA_FIELD_LEN {
        return Err(NestError::Build(format!(
            "attachment of {} bytes does not fit a ZIP extra field",
            attachment.len()
        )));
    }

    let mut out = Vec::with_capacity(framed_len);
    for chunk in attachment.chunks(max_chunk) {
        out.extend_from_slice(&EXTRA_FIELD_ID.to_le_bytes());
        out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
        out.extend_from_slice(chunk);
    }
    if attachment.is_empty() {
        out.extend_from_slice(&EXTRA_FIELD_ID.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    Ok(out)
}

/// Collects the attachment bytes out of a raw extra field.
///
/// Returns `None` when no attachment block is present.
pub fn unframe_extra(extra: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut rest = extra;
    let mut out: Option<Vec<u8>> = None;
    while !rest.is_empty() {
        if rest.len() < BLOCK_HEADER_LEN {
            return Err(NestError::MalformedAttachment("truncated extra field header".into()));
        }
        let id = u16::from_le_bytes([rest[0], rest[1]]);
        let size = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        rest = &rest[BLOCK_HEADER_LEN..];
        if rest.len() < size {
            return Err(NestError::MalformedAttachment(format!(
                "extra field block {id:#06x} declares {size} bytes but only {} remain",
                rest.len()
            )));
        }
        if id == EXTRA_FIELD_ID {
            out.get_or_insert_with(Vec::new).extend_from_slice(&rest[..size]);
        }
        rest = &rest[size..];
    }
    Ok(out)
}

/// Writes entries into a new nest.
pub struct NestWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    entries: usize,
}

impl<W: Write + Seek> NestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            entries: 0,
        }
    }

    /// Number of entries written so far, the root placeholder included.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Writes the root placeholder carrying the archive-level attachment.
    pub fn add_root(&mut self, attachment: &[u8]) -> Result<()> {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(DEFAULT_DIR_MODE);
        self.start_with_extra(ROOT_ENTRY_NAME, options, attachment)
    }

    /// Writes a directory entry. `name` must end with the entry separator.
    pub fn add_directory(&mut self, name: &str, mode: Option<u32>, attachment: Option<&[u8]>) -> Result<()> {
        debug_assert!(name.ends_with(ENTRY_SEPARATOR));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(mode.unwrap_or(DEFAULT_DIR_MODE));
        match attachment {
            Some(attachment) => self.start_with_extra(name, options, attachment),
            None => {
                self.zip.add_directory(name, options)?;
                self.entries += 1;
                Ok(())
            }
        }
    }

    /// Streams `reader` into a new file entry. Returns the number of bytes copied.
    pub fn add_file<R: Read>(
        &mut self,
        name: &str,
        reader: &mut R,
        mode: Option<u32>,
        attachment: Option<&[u8]>,
    ) -> Result<u64> {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(mode.unwrap_or(DEFAULT_FILE_MODE));
        match attachment {
            Some(attachment) => self.start_with_extra(name, options, attachment)?,
            None => {
                self.zip.start_file(name, options)?;
                self.entries += 1;
            }
        }
        let copied = io::copy(reader, &mut self.zip)?;
        Ok(copied)
    }

    fn start_with_extra(&mut self, name: &str, options: FileOptions, attachment: &[u8]) -> Result<()> {
        let extra = frame_extra(attachment)?;
        self.zip.start_file_with_extra_data(name, options)?;
        self.zip.write_all(&extra)?;
        self.zip.end_extra_data()?;
        self.entries += 1;
        Ok(())
    }

    /// Writes the central directory and flushes the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let mut inner = self.zip.finish()?;
        inner.flush()?;
        Ok(inner)
    }
}

/// What the expand pipeline needs to know about one stored entry.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub index: usize,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mode: Option<u32>,
    /// Decoded bytes of the entry's attachment blocks, if any.
    pub attachment: Option<Vec<u8>>,
}

impl EntryMeta {
    pub fn is_root(&self) -> bool {
        self.name == ROOT_ENTRY_NAME
    }
}

/// Read access to an existing nest.
pub struct NestReader {
    zip: ZipArchive<BufReader<File>>,
    path: PathBuf,
}

impl NestReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).at_path(path)?;
        let zip = ZipArchive::new(BufReader::new(file))?;
        Ok(Self {
            zip,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored entries, the root placeholder included.
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// The archive-level attachment, if the root placeholder is present.
    pub fn root_attachment(&mut self) -> Result<Option<Vec<u8>>> {
        let root = match self.zip.by_name(ROOT_ENTRY_NAME) {
            Ok(root) => root,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        unframe_extra(root.extra_data())
    }

    pub fn meta(&mut self, index: usize) -> Result<EntryMeta> {
        let entry = self.zip.by_index(index)?;
        Ok(EntryMeta {
            index,
            name: entry.name().to_owned(),
            is_dir: entry.is_dir(),
            size: entry.size(),
            mode: entry.unix_mode().map(|mode| mode & 0o7777),
            attachment: unframe_extra(entry.extra_data())?,
        })
    }

    /// Reads every entry's metadata in container order.
    pub fn metas(&mut self) -> Result<Vec<EntryMeta>> {
        (0..self.len()).map(|i| self.meta(i)).collect()
    }

    /// Streams the content of entry `index` into `out`.
    pub fn copy_to<W: Write>(&mut self, index: usize, out: &mut W) -> Result<u64> {
        let mut entry = self.zip.by_index(index)?;
        let copied = io::copy(&mut entry, out)?;
        Ok(copied)
    }
}
