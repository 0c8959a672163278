//! End-to-end scenarios for the layered read/write path.

use std::fs;
use std::path::PathBuf;

use livefs::{Error, FileType, LiveRestoreFs, OpenFlags, Options};
use tempfile::{TempDir, tempdir};

fn mount(temp: &TempDir) -> LiveRestoreFs {
    let dest = temp.path().join("dest");
    let source = temp.path().join("source");
    fs::create_dir(&dest).expect("create dest home");
    fs::create_dir(&source).expect("create source home");
    LiveRestoreFs::mount(&dest, Options::new(&source)).expect("mount")
}

fn seed_source(temp: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = temp.path().join("source").join(name);
    fs::write(&path, contents).expect("seed source file");
    path
}

fn logical(fs: &LiveRestoreFs, name: &str) -> PathBuf {
    fs.destination_home().join(name)
}

/// Whether this file system reports `set_len` regions as holes; scenarios
/// that reopen files and rely on the persisted sparse layout skip when it
/// does not.
fn holes_supported(temp: &TempDir) -> bool {
    let path = temp.path().join("probe.bin");
    let file = fs::File::create(&path).expect("create probe");
    file.set_len(1 << 20).expect("extend probe");
    let meta = fs::metadata(&path).expect("probe metadata");
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta.blocks() * 512 < meta.len()
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        false
    }
}

#[test]
fn s1_source_only_file_promotes_on_read() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);
    seed_source(&temp, "a.dat", &[0x41u8; 8192]);

    let file = fs
        .open(logical(&fs, "a.dat"), FileType::Regular, OpenFlags::default())
        .expect("open source-backed file");
    assert!(!file.complete());
    assert_eq!(
        file.holes()
            .iter()
            .map(|hole| (hole.offset, hole.length))
            .collect::<Vec<_>>(),
        vec![(0, 8192)]
    );

    let mut buf = [0u8; 4096];
    file.read(0, &mut buf).expect("read first half");
    assert!(buf.iter().all(|byte| *byte == 0x41));
    assert_eq!(
        file.holes()
            .iter()
            .map(|hole| (hole.offset, hole.length))
            .collect::<Vec<_>>(),
        vec![(4096, 4096)]
    );

    file.read(4096, &mut buf).expect("read second half");
    assert!(buf.iter().all(|byte| *byte == 0x41));
    assert!(file.holes().is_empty());
    assert!(!file.complete(), "source copy still exists");
    file.close().expect("close");
}

#[test]
fn s2_created_file_never_consults_source() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);

    let flags = OpenFlags {
        create: true,
        ..OpenFlags::default()
    };
    let file = fs
        .open(logical(&fs, "b.dat"), FileType::Regular, flags)
        .expect("create file");
    assert!(file.complete());
    assert!(file.holes().is_empty());

    file.write(0, &[0xAAu8; 512]).expect("write");
    let mut buf = [0u8; 512];
    file.read(0, &mut buf).expect("read back");
    assert!(buf.iter().all(|byte| *byte == 0xAA));
    file.close().expect("close");

    assert!(
        !temp.path().join("source").join("b.dat").exists(),
        "source layer must stay untouched"
    );
}

#[test]
fn s3_write_splits_hole_and_read_promotes_the_front() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);
    seed_source(&temp, "c.dat", &[0x43u8; 16384]);

    let file = fs
        .open(logical(&fs, "c.dat"), FileType::Regular, OpenFlags::default())
        .expect("open");
    file.write(4096, &[0xBBu8; 4096]).expect("write middle");
    assert_eq!(
        file.holes()
            .iter()
            .map(|hole| (hole.offset, hole.length))
            .collect::<Vec<_>>(),
        vec![(0, 4096), (8192, 8192)]
    );

    let mut buf = [0u8; 4096];
    file.read(0, &mut buf).expect("read promotes front");
    assert!(buf.iter().all(|byte| *byte == 0x43));
    assert_eq!(
        file.holes()
            .iter()
            .map(|hole| (hole.offset, hole.length))
            .collect::<Vec<_>>(),
        vec![(8192, 8192)]
    );

    file.read(4096, &mut buf).expect("read written range");
    assert!(buf.iter().all(|byte| *byte == 0xBB));
    file.close().expect("close");
}

#[test]
fn s4_remove_of_source_only_file_leaves_tombstone() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);
    seed_source(&temp, "d.dat", &[0x44u8; 128]);

    assert!(fs.exist(logical(&fs, "d.dat")).expect("exist before"));
    fs.remove(logical(&fs, "d.dat"), false).expect("remove");

    let dest_dir = temp.path().join("dest");
    assert!(!dest_dir.join("d.dat").exists());
    assert!(dest_dir.join("d.dat.deleted").exists());
    assert!(!fs.exist(logical(&fs, "d.dat")).expect("exist after"));

    let names = fs
        .directory_list(fs.destination_home(), None)
        .expect("list");
    assert!(names.is_empty(), "got {names:?}");
}

#[test]
fn s5_rename_tombstones_both_names() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);

    let flags = OpenFlags {
        create: true,
        ..OpenFlags::default()
    };
    let file = fs
        .open(logical(&fs, "e.dat"), FileType::Regular, flags)
        .expect("create");
    file.write(0, b"payload").expect("write");
    file.close().expect("close");

    fs.rename(logical(&fs, "e.dat"), logical(&fs, "f.dat"), false)
        .expect("rename");

    let dest_dir = temp.path().join("dest");
    assert!(!dest_dir.join("e.dat").exists());
    assert!(dest_dir.join("f.dat").exists());
    assert!(dest_dir.join("e.dat.deleted").exists());
    assert!(dest_dir.join("f.dat.deleted").exists());
    assert_eq!(
        fs::read(dest_dir.join("f.dat")).expect("read renamed"),
        b"payload"
    );
}

#[test]
fn rename_of_unmaterialized_name_is_not_found() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);
    seed_source(&temp, "only-source.dat", b"x");

    let err = fs
        .rename(
            logical(&fs, "only-source.dat"),
            logical(&fs, "elsewhere.dat"),
            false,
        )
        .expect_err("rename must fail");
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn s6_hole_list_past_source_end_fails_open() {
    let temp = tempdir().expect("tempdir");
    if !holes_supported(&temp) {
        return;
    }
    let fs = mount(&temp);
    seed_source(&temp, "g.dat", &[0x47u8; 8192]);

    // A destination backing file that claims more unpopulated bytes than
    // the source can provide.
    let dest_path = temp.path().join("dest").join("g.dat");
    let dest = fs::File::create(&dest_path).expect("create dest");
    dest.set_len(10240).expect("extend dest");
    drop(dest);

    let err = fs
        .open(logical(&fs, "g.dat"), FileType::Regular, OpenFlags::default())
        .expect_err("open must fail");
    assert!(matches!(err, Error::InvalidInput(_)), "got {err}");
}

#[test]
fn open_without_create_of_missing_file_is_not_found() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);

    let err = fs
        .open(logical(&fs, "nope.dat"), FileType::Regular, OpenFlags::default())
        .expect_err("open must fail");
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn open_directory_type_is_not_supported() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);

    let err = fs
        .open(
            fs.destination_home().to_path_buf(),
            FileType::Directory,
            OpenFlags::default(),
        )
        .expect_err("directory open must fail");
    assert!(matches!(err, Error::NotSupported(_)));
}

#[test]
fn exclusive_open_fails_when_source_holds_the_name() {
    let temp = tempdir().expect("tempdir");
    let fs = mount(&temp);
    seed_source(&temp, "taken.dat", b"x");

    let flags = OpenFlags {
        create: true,
        exclusive: true,
        ..OpenFlags::default()
    };
    let err = fs
        .open(logical(&fs, "taken.dat"), FileType::Regular, flags)
        .expect_err("exclusive open must fail");
    assert!(matches!(err, Error::Io(_)));
}
