mod util;

use std::error::Error;
use std::fs;

use nest::archive::{NestReader, ROOT_ENTRY_NAME};
use nest::{NestBuilder, NestError, NestExpander};
use tempfile::tempdir;
use util::{entry_names, mkdir, new_file, Tree};

type TestResult = Result<(), Box<dyn Error>>;

/// x/test.txt and x/a/{a1.txt, a2.txt, b/b1.txt, c/}
fn basic_source(root: &std::path::Path) -> std::io::Result<std::path::PathBuf> {
    let x = mkdir(root, "x")?;
    new_file(&x, "test.txt")?;
    let a = mkdir(&x, "a")?;
    new_file(&a, "a1.txt")?;
    new_file(&a, "a2.txt")?;
    new_file(&a, "b/b1.txt")?;
    mkdir(&a, "c")?;
    Ok(x)
}

#[test]
fn default_locations_are_transparent() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;

    let archive = NestBuilder::new()
        .add(x.join("test.txt"))?
        .add(x.join("a"))?
        .build(dir.path(), "nest.zip")?;
    assert_eq!(archive, dir.path().join("nest.zip"));

    assert_eq!(
        entry_names(&archive),
        ["test.txt", "a/", "a/a1.txt", "a/a2.txt", "a/b/", "a/b/b1.txt", "a/c/"]
    );

    let y = dir.path().join("y");
    let summary = NestExpander::open(&archive)?.expand(&y)?;
    assert_eq!(summary.files, 4);
    assert_eq!(summary.directories, 3);
    assert_eq!(Tree::read(&y), Tree::read(&x));
    Ok(())
}

#[test]
fn absolute_source_paths_and_excluded_siblings() -> TestResult {
    let dir = tempdir()?;
    let base = mkdir(dir.path(), "nest_base")?;
    let test_file = new_file(&base, "test.txt")?;
    let a = mkdir(&base, "a")?;
    new_file(&a, "a1TestFile.txt")?;
    new_file(&a, "a2TestFile.txt")?;
    new_file(&a, "b/b1TestFile.txt")?;
    mkdir(&a, "c")?;
    mkdir(&base, "d")?;

    let archive = NestBuilder::new()
        .add(fs::canonicalize(&test_file)?)?
        .add(fs::canonicalize(&a)?)?
        .build(dir.path(), "nest.zip")?;

    let expanded = dir.path().join("expanded-nest");
    NestExpander::open(&archive)?.expand(&expanded)?;

    let expected = Tree::new()
        .file("test.txt", &test_file)
        .subtree("a", &a, |_| true);
    assert_eq!(Tree::read(&expanded), expected);
    assert!(!expanded.join("d").exists());
    Ok(())
}

#[test]
fn no_metadata_means_no_root_placeholder() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;

    // named source locations are never recorded
    let archive = NestBuilder::new()
        .name_source_location("X")?
        .add_location_path("X", "test.txt")?
        .link_source_location("X", x.to_str().ok_or("utf-8")?)?
        .build(dir.path(), "plain.zip")?;

    let mut reader = NestReader::open(&archive)?;
    assert_eq!(reader.root_attachment()?, None);
    let metas = reader.metas()?;
    assert_eq!(metas.len(), 1);
    assert!(metas[0].attachment.is_none());
    Ok(())
}

#[test]
fn declared_locations_add_a_root_placeholder() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;

    let archive = NestBuilder::new()
        .name_nest_location("MISC", "misc")?
        .add(x.join("test.txt"))?
        .under_location("MISC")?
        .build(dir.path(), "meta.zip")?;

    let names = entry_names(&archive);
    assert_eq!(names, [ROOT_ENTRY_NAME, "misc/test.txt"]);

    let mut reader = NestReader::open(&archive)?;
    assert!(reader.root_attachment()?.is_some());
    assert!(reader.meta(1)?.attachment.is_some(), "breadcrumb on the entry");

    // the placeholder never shows up on disk
    let out = dir.path().join("out");
    let summary = NestExpander::open(&archive)?.expand(&out)?;
    assert_eq!(summary.files, 1);
    assert_eq!(summary.directories, 0);
    assert_eq!(Tree::read(&out), Tree::new().file("misc/test.txt", &x.join("test.txt")));
    Ok(())
}

#[test]
fn missing_source_leaves_no_archive() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;
    let out = mkdir(dir.path(), "out")?;

    let err = NestBuilder::new()
        .add(x.join("test.txt"))?
        .add(x.join("does-not-exist.txt"))?
        .build(&out, "nest.zip")
        .unwrap_err();
    match err {
        NestError::Build(msg) => assert!(msg.contains("does-not-exist.txt"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read_dir(&out)?.count(), 0, "no partial or temporary file");
    Ok(())
}

#[test]
fn existing_archive_is_replaced() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;
    fs::write(dir.path().join("nest.zip"), b"stale")?;

    let archive = NestBuilder::new()
        .add(x.join("test.txt"))?
        .build(dir.path(), "nest.zip")?;
    assert_eq!(entry_names(&archive), ["test.txt"]);
    Ok(())
}

#[test]
fn build_target_checks() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;
    mkdir(dir.path(), "taken.zip")?;

    let builder = NestBuilder::new().add(x.join("test.txt"))?.done();
    assert!(matches!(
        builder.build(dir.path(), "taken.zip"),
        Err(NestError::Build(_))
    ));
    assert!(matches!(
        builder.build(x.join("test.txt"), "nest.zip"),
        Err(NestError::Build(_))
    ));
    assert!(matches!(
        builder.build(dir.path(), ""),
        Err(NestError::InvalidArgument(_))
    ));

    // missing output directories are created
    let nested = dir.path().join("deep").join("er");
    assert!(builder.build(&nested, "nest.zip")?.is_file());
    Ok(())
}

#[test]
fn expand_base_must_be_a_directory() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;
    let archive = NestBuilder::new()
        .add(x.join("test.txt"))?
        .build(dir.path(), "nest.zip")?;

    let err = NestExpander::open(&archive)?
        .expand(x.join("test.txt"))
        .unwrap_err();
    assert!(matches!(err, NestError::Expand(_)));
    Ok(())
}

#[test]
fn expansion_overwrites_existing_files() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;
    let archive = NestBuilder::new()
        .add(x.join("test.txt"))?
        .build(dir.path(), "nest.zip")?;

    let out = mkdir(dir.path(), "out")?;
    fs::write(out.join("test.txt"), b"old and much longer content")?;
    NestExpander::open(&archive)?.expand(&out)?;
    assert_eq!(fs::read(out.join("test.txt"))?, fs::read(x.join("test.txt"))?);
    Ok(())
}

#[cfg(unix)]
#[test]
fn unix_permissions_survive() -> TestResult {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir()?;
    let x = basic_source(dir.path())?;
    let script = x.join("a").join("run.sh");
    fs::write(&script, b"#!/bin/sh\n")?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o750))?;

    let archive = NestBuilder::new().add(x.join("a"))?.build(dir.path(), "nest.zip")?;
    let out = dir.path().join("out");
    NestExpander::open(&archive)?.expand(&out)?;

    let mode = fs::metadata(out.join("a").join("run.sh"))?.permissions().mode();
    assert_eq!(mode & 0o777, 0o750);
    Ok(())
}

#[test]
fn building_into_the_source_tree_skips_the_archive() -> TestResult {
    let dir = tempdir()?;
    let x = mkdir(dir.path(), "x")?;
    new_file(&x, "a.txt")?;
    let snapshot = Tree::read(&x);

    let archive = NestBuilder::new().add(&x)?.build(&x, "n.zip")?;
    assert_eq!(entry_names(&archive), ["x/", "x/a.txt"]);

    // the previous archive is replaced, not stored
    let archive = NestBuilder::new().add(&x)?.build(&x, "n.zip")?;
    assert_eq!(entry_names(&archive), ["x/", "x/a.txt"]);

    let out = dir.path().join("out");
    NestExpander::open(&archive)?.expand(&out)?;
    assert_eq!(Tree::read(&out), Tree::new().subtree("x", &x, |p| p != "n.zip"));
    assert_eq!(Tree::read(&out.join("x")), snapshot);
    Ok(())
}

#[test]
fn nameless_source_paths_use_the_directory_name() -> TestResult {
    let dir = tempdir()?;
    let x = basic_source(dir.path())?;

    let archive = NestBuilder::new()
        .add(x.join("a").join(".."))?
        .build(dir.path(), "nest.zip")?;
    let names = entry_names(&archive);
    assert_eq!(names[0], "x/");
    assert!(names.contains(&"x/a/a1.txt".to_owned()));
    Ok(())
}
