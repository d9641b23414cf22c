//! USDZ package reader.
//!
//! A package is an uncompressed ZIP archive whose first USD entry is the root
//! layer. Only text entries can be read; binary crate entries are reported as
//! unsupported.

use std::{collections::HashMap, fs::File, io::Read, path::Path};

use anyhow::{bail, Context, Result};
use zip::ZipArchive;

use crate::{sdf, usda};

/// USDZ archive reader.
pub struct Archive {
    archive: ZipArchive<File>,
}

impl Archive {
    /// Open a USDZ archive from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open USDZ archive: {}", path.display()))?;

        let archive =
            ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive: {}", path.display()))?;

        Ok(Self { archive })
    }

    /// Returns a list of all file names in the archive.
    pub fn file_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_owned).collect()
    }

    /// The first USD entry of the package, which is its root layer.
    pub fn find_root_layer(&self) -> Option<String> {
        self.archive
            .file_names()
            .find(|name| {
                let lower = name.to_lowercase();
                lower.ends_with(".usdc") || lower.ends_with(".usda") || lower.ends_with(".usd")
            })
            .map(str::to_owned)
    }

    /// Read and parse a text layer stored in the archive.
    pub fn read(&mut self, file_path: &str) -> Result<HashMap<sdf::Path, sdf::Spec>> {
        let mut file = self
            .archive
            .by_name(file_path)
            .with_context(|| format!("File '{file_path}' not found in archive"))?;

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read file '{file_path}' from archive"))?;

        let lower = file_path.to_lowercase();
        if lower.ends_with(".usdc") || buffer.starts_with(b"PXR-USDC") {
            bail!("Binary crate entries are not supported: '{file_path}'");
        }
        if !(lower.ends_with(".usda") || lower.ends_with(".usd")) {
            bail!("Unsupported file format for '{file_path}'. Expected a .usda entry");
        }

        let content = String::from_utf8(buffer).with_context(|| format!("File '{file_path}' is not valid UTF-8"))?;
        usda::parse(&content).with_context(|| format!("Failed to parse USDA data from '{file_path}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_package(dir: &Path, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.join("package.usdz");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, text) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(text.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn read_root_layer() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_package(
            dir.path(),
            &[
                ("textures/readme.txt", "not a layer"),
                ("scene.usda", "#usda 1.0\ndef Xform \"Root\"\n{\n}\n"),
            ],
        );

        let mut archive = Archive::open(&path)?;
        assert_eq!(archive.file_names().len(), 2);

        let root = archive.find_root_layer().expect("root layer");
        assert_eq!(root, "scene.usda");

        let data = archive.read(&root)?;
        assert!(data.contains_key(&sdf::Path::abs_root()));
        assert!(data.contains_key(&sdf::path("/Root")?));

        let layer = sdf::Layer::open(&path)?;
        assert!(layer.has_spec(&sdf::path("/Root")?));
        Ok(())
    }

    #[test]
    fn reject_binary_entries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_package(dir.path(), &[("scene.usdc", "PXR-USDC")]);

        let mut archive = Archive::open(&path)?;
        assert!(archive.read("scene.usdc").is_err());
        Ok(())
    }
}
