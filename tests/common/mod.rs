#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    write_jar_with(path, entries, zip::CompressionMethod::Deflated)
}

/// Writes a jar whose entries are stored uncompressed, so payload bytes can be found and
/// damaged in the raw file.
pub fn write_stored_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    write_jar_with(path, entries, zip::CompressionMethod::Stored)
}

fn write_jar_with(
    path: &Path,
    entries: &[(&str, &[u8])],
    method: zip::CompressionMethod,
) -> anyhow::Result<()> {
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(method);

    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options)?;
        } else {
            zip.start_file(*name, options)?;
            zip.write_all(content)?;
        }
    }
    zip.finish()?;
    Ok(())
}

/// Entry names and contents of a jar, in archive order.
pub fn read_jar(path: &Path) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    let file = std::fs::File::open(path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut out = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        out.push((entry.name().to_string(), content));
    }
    Ok(out)
}

/// Every file's ancestor directories appear exactly once, before the file.
pub fn assert_directories_precede_files(names: &[&str]) {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        assert!(seen.insert(*name), "{name} emitted twice");
        let trimmed = name.strip_suffix('/').unwrap_or(name);
        let mut at = 0;
        while let Some(pos) = trimmed[at..].find('/') {
            let dir = &trimmed[..at + pos + 1];
            assert!(seen.contains(dir), "{dir} missing before {name}");
            at += pos + 1;
        }
    }
}

/// Minimal class file writer. Utf8 constants are shared the way javac shares them, so a
/// class name and an identical string constant point at the same entry.
pub struct ClassBuilder {
    pool: Vec<Vec<u8>>,
    utf8: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    fields: Vec<(u16, u16)>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            pool: Vec::new(),
            utf8: HashMap::new(),
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
        };
        builder.this_class = builder.class_ref(name);
        builder.super_class = builder.class_ref("java/lang/Object");
        builder
    }

    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.pool.push(entry);
        self.pool.len() as u16
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8.get(value) {
            return *index;
        }
        let mut entry = vec![1];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        let index = self.push(entry);
        self.utf8.insert(value.to_string(), index);
        index
    }

    pub fn class_ref(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        let mut entry = vec![7];
        entry.extend_from_slice(&name_index.to_be_bytes());
        self.push(entry)
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = self.class_ref(name);
        self
    }

    pub fn reference(mut self, name: &str) -> Self {
        self.class_ref(name);
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        let value_index = self.utf8(value);
        let mut entry = vec![8];
        entry.extend_from_slice(&value_index.to_be_bytes());
        self.push(entry);
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.push((name_index, descriptor_index));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 52]);
        out.extend_from_slice(&(self.pool.len() as u16 + 1).to_be_bytes());
        for entry in &self.pool {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (name, descriptor) in &self.fields {
            out.extend_from_slice(&0x0002u16.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

pub fn class(name: &str) -> Vec<u8> {
    ClassBuilder::new(name).build()
}
