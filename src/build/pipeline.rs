//! The build pass: resolve every entry and stream it into the container.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::NestBuilder;
use crate::archive::{NestWriter, ENTRY_SEPARATOR};
use crate::attachment::records::encode_locations;
use crate::attachment::{self, ENTRY_EXPAND_TARGET, ENTRY_LOCATIONS, EXPAND_LOCATIONS, NEST_LOCATIONS};
use crate::entry::BuildEntry;
use crate::error::{IoResultExt, NestError, Result};
use crate::fsx;
use crate::location::{join_segments, resolve};

pub(super) fn build(session: &NestBuilder, dir: &Path, file_name: &str) -> Result<PathBuf> {
    if file_name.is_empty() {
        return Err(NestError::invalid("archive file name is empty"));
    }
    match fsx::metadata_if_exists(dir)? {
        Some(meta) if !meta.is_dir() => {
            return Err(NestError::Build(format!("'{}' is not a directory", dir.display())));
        }
        Some(_) => {}
        None => std::fs::create_dir_all(dir).at_path(dir)?,
    }
    let target = dir.join(file_name);
    if fsx::metadata_if_exists(&target)?.is_some_and(|meta| meta.is_dir()) {
        return Err(NestError::Build(format!(
            "target archive '{}' is a directory",
            target.display()
        )));
    }

    let root = root_attachment(session)?;

    // dropped (and deleted) on every early return below
    let mut tmp = tempfile::Builder::new()
        .prefix(".nest-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .at_path(dir)?;

    let own_files = OwnFiles::new(tmp.path(), &target)?;
    let written = {
        let mut writer = NestWriter::new(BufWriter::new(tmp.as_file_mut()));
        if let Some(root) = &root {
            writer.add_root(root)?;
        }
        for entry in &session.entries {
            write_entry(session, &mut writer, entry, &own_files)?;
        }
        let written = writer.entries();
        writer.finish()?;
        written
    };

    tmp.persist(&target).map_err(|e| NestError::io(e.error, &target))?;
    info!(
        archive = %target.display(),
        entries = written,
        metadata = root.is_some(),
        "nest built"
    );
    Ok(target)
}

/// Archive-level metadata: every declared nest and expand location.
fn root_attachment(session: &NestBuilder) -> Result<Option<Vec<u8>>> {
    attachment::encode([
        (NEST_LOCATIONS, encode_locations(session.nest.iter())?),
        (EXPAND_LOCATIONS, encode_locations(session.expand.iter())?),
    ])
}

/// Entry-level metadata: the nest breadcrumb and the recorded expand target.
fn entry_attachment(session: &NestBuilder, entry: &BuildEntry) -> Result<Option<Vec<u8>>> {
    let crumb = match entry.breadcrumb(&session.nest)? {
        Some(location) => encode_locations([location])?,
        None => None,
    };
    let target = match &entry.expand {
        Some(target) => encode_locations([target.get(&session.expand)?])?,
        None => None,
    };
    attachment::encode([(ENTRY_LOCATIONS, crumb), (ENTRY_EXPAND_TARGET, target)])
}

/// The archive being written and the temporary file it is written to. A
/// source tree that contains the output directory must not pick them up.
struct OwnFiles {
    paths: Vec<PathBuf>,
}

impl OwnFiles {
    fn new(tmp: &Path, target: &Path) -> Result<Self> {
        let tmp = fs::canonicalize(tmp).at_path(tmp)?;
        let mut paths = vec![tmp];
        if let (Some(dir), Some(name)) = (target.parent(), target.file_name()) {
            let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
            paths.push(fs::canonicalize(dir).at_path(dir)?.join(name));
        }
        Ok(Self { paths })
    }

    fn contains(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        self.paths
            .iter()
            .filter(|own| own.file_name() == Some(name))
            .any(|own| fs::canonicalize(path).is_ok_and(|path| &path == own))
    }
}

/// The filesystem path an entry reads from.
///
/// A source that resolves to `.` or ends in `..` has no name of its own and
/// is replaced by its canonical form.
fn resolve_source_path(session: &NestBuilder, entry: &BuildEntry) -> Result<PathBuf> {
    let source = entry.source.get(&session.source)?;
    let path = resolve(source, &session.source)?
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    if path.file_name().is_some() {
        return Ok(path);
    }
    match fsx::metadata_if_exists(&path)? {
        Some(_) => fs::canonicalize(&path).at_path(&path),
        None => Ok(path),
    }
}

fn write_entry<W: Write + Seek>(
    session: &NestBuilder,
    writer: &mut NestWriter<W>,
    entry: &BuildEntry,
    own_files: &OwnFiles,
) -> Result<()> {
    let source_path = resolve_source_path(session, entry)?;

    let Some(meta) = fsx::metadata_if_exists(&source_path)? else {
        return Err(NestError::Build(format!(
            "source path '{}' does not exist",
            source_path.display()
        )));
    };
    let base_name = source_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            NestError::Build(format!(
                "source path '{}' has no usable file name",
                source_path.display()
            ))
        })?;

    let nest = entry.nest.get(&session.nest)?;
    let entry_name = match resolve(nest, &session.nest)? {
        Some(nest_path) => join_segments(&nest_path, base_name, ENTRY_SEPARATOR),
        None => base_name.to_owned(),
    };
    let entry_name = normalize_entry_name(&entry_name)?;

    let attachment = entry_attachment(session, entry)?;
    debug!(
        source = %source_path.display(),
        entry = %entry_name,
        dir = meta.is_dir(),
        "adding entry"
    );
    if meta.is_dir() {
        write_tree(writer, &source_path, &entry_name, attachment.as_deref(), own_files)
    } else {
        write_file(writer, &source_path, &entry_name, &meta, attachment.as_deref())
    }
}

/// Strips leading separators and rejects names that escape the archive root.
fn normalize_entry_name(name: &str) -> Result<String> {
    let trimmed = name.trim_start_matches(ENTRY_SEPARATOR);
    if trimmed.split(ENTRY_SEPARATOR).any(|segment| segment == "..") {
        return Err(NestError::Build(format!("entry name '{name}' escapes the archive root")));
    }
    Ok(trimmed.to_owned())
}

/// Writes a directory entry followed by its whole subtree, depth first and
/// sorted by file name. Only the top-level entry carries the attachment.
fn write_tree<W: Write + Seek>(
    writer: &mut NestWriter<W>,
    root: &Path,
    root_name: &str,
    attachment: Option<&[u8]>,
    own_files: &OwnFiles,
) -> Result<()> {
    let walk = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|item| item.depth() == 0 || !own_files.contains(item.path()));
    for item in walk {
        let item = item.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            NestError::io(io::Error::from(e), path)
        })?;

        let mut name = root_name.to_owned();
        let relative = item.path().strip_prefix(root).map_err(|_| {
            NestError::Build(format!("'{}' is outside '{}'", item.path().display(), root.display()))
        })?;
        for component in relative.components() {
            let segment = component.as_os_str().to_str().ok_or_else(|| {
                NestError::Build(format!("path '{}' is not valid UTF-8", item.path().display()))
            })?;
            name.push(ENTRY_SEPARATOR);
            name.push_str(segment);
        }

        let meta = item.metadata().map_err(|e| {
            let path = item.path().to_path_buf();
            NestError::io(io::Error::from(e), path)
        })?;
        let attachment = if item.depth() == 0 { attachment } else { None };
        if meta.is_dir() {
            name.push(ENTRY_SEPARATOR);
            writer.add_directory(&name, fsx::unix_mode(&meta), attachment)?;
            debug!(entry = %name, "stored directory");
        } else {
            write_file(writer, item.path(), &name, &meta, attachment)?;
        }
    }
    Ok(())
}

fn write_file<W: Write + Seek>(
    writer: &mut NestWriter<W>,
    path: &Path,
    name: &str,
    meta: &std::fs::Metadata,
    attachment: Option<&[u8]>,
) -> Result<()> {
    let mut file = File::open(path).at_path(path)?;
    let copied = writer
        .add_file(name, &mut file, fsx::unix_mode(meta), attachment)
        .map_err(|e| match e {
            NestError::Io { source, .. } => NestError::io(source, path),
            other => other,
        })?;
    debug!(entry = %name, bytes = copied, "stored file");
    Ok(())
}
