//! Document encodings of a [`Store`]: a tree keyed by scanner name, each
//! holding its keys with their value sets, in sorted order.

mod json;
mod xml;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TypedexError};
use crate::query::Typedex;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Xml,
    Json,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
        }
    }

    /// Picks the format from a file or entry name's extension.
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        if extension.eq_ignore_ascii_case("xml") {
            Some(Format::Xml)
        } else if extension.eq_ignore_ascii_case("json") {
            Some(Format::Json)
        } else {
            None
        }
    }

    pub fn encode(self, store: &Store) -> Result<String> {
        match self {
            Format::Xml => xml::encode(store),
            Format::Json => json::encode(store),
        }
    }

    /// Decodes a whole document; any malformed part fails the decode.
    pub fn decode(self, text: &str, origin: &str) -> Result<Store> {
        match self {
            Format::Xml => xml::decode(text, origin),
            Format::Json => json::decode(text, origin),
        }
    }
}

impl Typedex {
    /// Writes the store to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>, format: Format) -> Result<PathBuf> {
        let path = path.as_ref();
        let document = format.encode(self.store())?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| TypedexError::io(parent, source))?;
        }
        fs::write(path, document).map_err(|source| TypedexError::io(path, source))?;
        debug!(path = %path.display(), ?format, "index saved");
        Ok(path.to_path_buf())
    }

    /// Reads a document saved by [`Typedex::save`]; the format follows the
    /// file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let format = Format::from_name(&origin).ok_or_else(|| {
            TypedexError::decode(origin.as_str(), "unknown document extension")
        })?;
        let text = fs::read_to_string(path).map_err(|source| TypedexError::io(path, source))?;
        Ok(Typedex::new(format.decode(&text, &origin)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Index;
    use std::sync::Arc;

    fn sample() -> Store {
        let subtypes = Index::new();
        subtypes.put("app.Base", "app.Child");
        subtypes.put("app.Base", "app.Other");
        subtypes.put("app.Api", "app.Child");
        let elements = Index::new();
        elements.put("app.Child", "");
        elements.put("app.Child", "run(java.util.List<T>)");
        let resources = Index::new();
        resources.put("a&b.txt", "res/a&b.txt");
        let mut store = Store::new();
        store.insert("SubTypes", Arc::new(subtypes));
        store.insert("TypeElements", Arc::new(elements));
        store.insert("Resources", Arc::new(resources));
        store.insert("Empty", Arc::new(Index::new()));
        store
    }

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(Format::from_name("a/app-reflections.xml"), Some(Format::Xml));
        assert_eq!(Format::from_name("app-reflections.JSON"), Some(Format::Json));
        assert_eq!(Format::from_name("app-reflections"), None);
    }

    #[test]
    fn both_formats_round_trip() {
        let store = sample();
        for format in [Format::Xml, Format::Json] {
            let document = format.encode(&store).unwrap();
            let decoded = format.decode(&document, "memory").unwrap();
            assert_eq!(decoded, store, "{format:?}");
            assert_eq!(
                decoded.scanner_names().collect::<Vec<_>>(),
                vec!["Empty", "Resources", "SubTypes", "TypeElements"]
            );
        }
    }

    #[test]
    fn save_and_load_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let typedex = Typedex::new(sample());
        let path = typedex
            .save(dir.path().join("META-INF/reflections/app-reflections.json"), Format::Json)
            .unwrap();
        assert_eq!(Typedex::load(&path).unwrap().store(), &sample());
    }

    #[test]
    fn malformed_documents_fail() {
        assert!(matches!(
            Format::Xml.decode("<Index><SubTypes><entry><values/></entry>", "broken.xml"),
            Err(TypedexError::Decode { .. })
        ));
        assert!(matches!(
            Format::Json.decode("{\"SubTypes\": [1]}", "broken.json"),
            Err(TypedexError::Decode { .. })
        ));
    }
}
