use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;
use typedex_vfs::{
    Dir, Entries, Entry, PlainDirectory, ResolverStrategy, SourceLocator, StreamedArchive, Vfs,
    VfsError,
};
use zip::ZipWriter;
use zip::write::FileOptions;

fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create jar");
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(name.trim_end_matches('/'), FileOptions::default())
                .expect("add directory");
            continue;
        }
        writer
            .start_file(*name, FileOptions::default())
            .expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

fn jar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(*name, FileOptions::default())
            .expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish jar").into_inner()
}

fn collect(dir: &mut Box<dyn Dir>) -> Vec<(String, String, Vec<u8>)> {
    let mut items: Vec<_> = dir
        .entries()
        .expect("enumerate")
        .map(|entry| {
            let entry = entry.expect("entry");
            let mut bytes = Vec::new();
            entry
                .open()
                .expect("open")
                .read_to_end(&mut bytes)
                .expect("read");
            (
                entry.name().to_string(),
                entry.relative_path().to_string(),
                bytes,
            )
        })
        .collect();
    items.sort();
    items
}

#[test]
fn enumerates_directory_files_with_relative_paths() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("app/nested")).unwrap();
    fs::write(temp.path().join("app/Config.class"), b"class").unwrap();
    fs::write(temp.path().join("app/nested/config.properties"), b"k=v").unwrap();

    let vfs = Vfs::default();
    let mut dir = vfs.resolve(&SourceLocator::from_path(temp.path())).unwrap();
    let items = collect(&mut dir);

    assert_eq!(
        items,
        vec![
            (
                "Config.class".to_string(),
                "app/Config.class".to_string(),
                b"class".to_vec()
            ),
            (
                "config.properties".to_string(),
                "app/nested/config.properties".to_string(),
                b"k=v".to_vec()
            ),
        ]
    );
}

#[test]
fn enumerates_archive_entries_and_skips_directories() {
    let temp = tempdir().unwrap();
    let jar = temp.path().join("lib.jar");
    write_jar(
        &jar,
        &[
            ("app/", b""),
            ("app/Config.class", b"cafe"),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
        ],
    );

    let mut dir = Vfs::default()
        .resolve(&SourceLocator::new(format!("file:{}", jar.display())))
        .unwrap();
    let paths: Vec<_> = collect(&mut dir).into_iter().map(|item| item.1).collect();
    assert_eq!(paths, vec!["META-INF/MANIFEST.MF", "app/Config.class"]);
}

#[test]
fn entries_are_single_pass() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), b"a").unwrap();
    let mut dir = Vfs::default()
        .resolve(&SourceLocator::from_path(temp.path()))
        .unwrap();
    assert_eq!(dir.entries().unwrap().count(), 1);
    assert!(matches!(
        dir.entries(),
        Err(VfsError::AlreadyEnumerated { .. })
    ));
}

#[test]
fn archive_entries_stay_readable_after_reopen() {
    let temp = tempdir().unwrap();
    let jar = temp.path().join("lib.jar");
    write_jar(&jar, &[("a/B.class", b"bytes")]);
    let mut dir = Vfs::default().resolve(&SourceLocator::from_path(&jar)).unwrap();
    let entry = dir.entries().unwrap().next().unwrap().unwrap();
    assert_eq!(entry.read_bytes().unwrap(), b"bytes");
    assert_eq!(entry.read_bytes().unwrap(), b"bytes");
}

#[test]
fn declared_entry_size_is_not_trusted() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("a/B.class", stored).expect("start entry");
    writer.write_all(b"bytes").expect("write entry");
    let mut bytes = writer.finish().expect("finish jar").into_inner();

    // Claim an uncompressed size of almost 4 GiB in the central directory.
    let header = bytes
        .windows(4)
        .position(|window| window == [0x50, 0x4b, 0x01, 0x02])
        .expect("central directory header");
    bytes[header + 24..header + 28].copy_from_slice(&0xffff_fff0u32.to_le_bytes());

    let temp = tempdir().unwrap();
    let jar = temp.path().join("forged.jar");
    fs::write(&jar, &bytes).unwrap();
    let mut dir = Vfs::default().resolve(&SourceLocator::from_path(&jar)).unwrap();
    let entry = dir.entries().unwrap().next().unwrap().unwrap();
    assert_eq!(entry.read_bytes().unwrap(), b"bytes");
}

#[test]
fn streamed_archive_reads_forward_only() {
    let temp = tempdir().unwrap();
    let jar = temp.path().join("stream.jar");
    write_jar(&jar, &[("x/One.class", b"1"), ("x/Two.class", b"22")]);

    let vfs = Vfs::new(vec![Arc::new(StreamedArchive::local())]);
    let mut dir = vfs.resolve(&SourceLocator::from_path(&jar)).unwrap();
    let items = collect(&mut dir);
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].1, "x/Two.class");
    assert_eq!(items[1].2, b"22");
}

#[test]
fn streamed_archive_uses_custom_connector() {
    let payload = Arc::new(jar_bytes(&[("remote/R.class", b"r")]));
    let connector_payload = Arc::clone(&payload);
    let strategy = StreamedArchive::with_connector(move |_locator: &SourceLocator| {
        Ok(Box::new(Cursor::new(connector_payload.as_ref().clone())) as Box<dyn Read + Send>)
    });
    let vfs = Vfs::new(vec![Arc::new(strategy)]);
    let mut dir = vfs
        .resolve(&SourceLocator::new("https://repo.example/lib.jar"))
        .unwrap();
    let items = collect(&mut dir);
    assert_eq!(items[0].1, "remote/R.class");
}

#[test]
fn archive_url_can_narrow_to_a_prefix() {
    let temp = tempdir().unwrap();
    let jar = temp.path().join("boot.jar");
    write_jar(
        &jar,
        &[
            ("BOOT-INF/classes/app/Main.class", b"m"),
            ("BOOT-INF/lib/readme.txt", b"r"),
        ],
    );
    let locator = SourceLocator::new(format!("jar:file:{}!/BOOT-INF/classes/", jar.display()));
    let mut dir = Vfs::default().resolve(&locator).unwrap();
    let paths: Vec<_> = collect(&mut dir).into_iter().map(|item| item.1).collect();
    assert_eq!(paths, vec!["app/Main.class"]);
}

#[test]
fn archive_url_opens_nested_archives() {
    let temp = tempdir().unwrap();
    let inner = jar_bytes(&[("inner/Lib.class", b"lib")]);
    let jar = temp.path().join("outer.jar");
    write_jar(&jar, &[("lib/inner.jar", &inner), ("Top.class", b"top")]);

    let locator = SourceLocator::new(format!("jar:file:{}!/lib/inner.jar", jar.display()));
    let mut dir = Vfs::default().resolve(&locator).unwrap();
    let items = collect(&mut dir);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].1, "inner/Lib.class");
    assert_eq!(items[0].2, b"lib");
}

#[test]
fn unresolvable_locator_is_source_unavailable() {
    let err = Vfs::default()
        .resolve(&SourceLocator::new("/definitely/not/here"))
        .err()
        .expect("resolution fails");
    assert!(matches!(err, VfsError::SourceUnavailable { .. }));
}

#[test]
fn find_entries_skips_failed_locators() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("keep.properties"), b"").unwrap();
    fs::write(temp.path().join("Skip.class"), b"").unwrap();
    let broken = temp.path().join("broken.jar");
    fs::write(&broken, b"not a zip").unwrap();

    let locators = vec![
        SourceLocator::new("/missing/location"),
        SourceLocator::from_path(&broken),
        SourceLocator::from_path(temp.path()),
    ];
    let entries = Vfs::default().find_entries(&locators, |entry| {
        entry.name().ends_with(".properties")
    });
    let paths: Vec<_> = entries.iter().map(Entry::relative_path).collect();
    assert_eq!(paths, vec!["keep.properties"]);
}

struct InMemory;

struct InMemoryDir {
    done: bool,
}

impl Dir for InMemoryDir {
    fn path(&self) -> &str {
        "mem:"
    }

    fn entries(&mut self) -> Result<Entries<'_>, VfsError> {
        if std::mem::replace(&mut self.done, true) {
            return Err(VfsError::AlreadyEnumerated {
                path: "mem:".into(),
            });
        }
        Ok(Box::new(std::iter::once(Ok(Entry::from_bytes(
            "mem/Thing.class",
            b"thing".to_vec(),
        )))))
    }
}

impl ResolverStrategy for InMemory {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn matches(&self, locator: &SourceLocator) -> bool {
        locator.scheme() == Some("mem")
    }

    fn open(&self, _locator: &SourceLocator) -> Result<Box<dyn Dir>, VfsError> {
        Ok(Box::new(InMemoryDir { done: false }))
    }
}

#[test]
fn extension_strategies_run_after_builtins() {
    let vfs = Vfs::new(vec![Arc::new(PlainDirectory)]).with_strategy(Arc::new(InMemory));
    assert_eq!(vfs.strategy_names(), vec!["directory", "in-memory"]);
    let entries = vfs.find_entries(&[SourceLocator::new("mem:root")], |_| true);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name(), "Thing.class");
}
