#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;

use typedex_classfile::fixtures::ClassBuilder;
use zip::ZipWriter;
use zip::write::FileOptions;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Lays `builders` out under `root` the way a compiler output directory would.
pub fn write_classes(root: &Path, builders: &[ClassBuilder]) {
    for builder in builders {
        write_file(root, &builder.relative_path(), &builder.build());
    }
}

pub fn write_file(root: &Path, relative_path: &str, bytes: &[u8]) {
    let path = root.join(relative_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, bytes).expect("write file");
}

pub fn class_entries(builders: &[ClassBuilder]) -> Vec<(String, Vec<u8>)> {
    builders
        .iter()
        .map(|builder| (builder.relative_path(), builder.build()))
        .collect()
}

pub fn write_jar(path: &Path, entries: &[(String, Vec<u8>)]) {
    let file = File::create(path).expect("create jar");
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in entries {
        writer
            .start_file(name.as_str(), FileOptions::default())
            .expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

pub fn jar_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(name.as_str(), FileOptions::default())
            .expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish jar").into_inner()
}

pub fn set(values: &[&str]) -> std::collections::BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}
