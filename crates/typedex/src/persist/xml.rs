use std::collections::BTreeSet;
use std::io::Cursor;
use std::mem;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::error::{Result, TypedexError};
use crate::store::{Store, StoreSnapshot};

const ROOT: &str = "Index";

#[derive(Debug, Error)]
enum XmlError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Writer(#[from] quick_xml::Error),
    #[error("{0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<XmlError> for TypedexError {
    fn from(error: XmlError) -> Self {
        TypedexError::Encode(error.to_string())
    }
}

pub(super) fn encode(store: &Store) -> Result<String> {
    Ok(write_document(store)?)
}

fn write_document(store: &Store) -> std::result::Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(ROOT)))?;

    for (scanner, index) in store.snapshot() {
        writer.write_event(Event::Start(BytesStart::new(scanner.as_str())))?;
        for (key, values) in index {
            writer.write_event(Event::Start(BytesStart::new("entry")))?;
            write_simple(&mut writer, "key", &key)?;
            writer.write_event(Event::Start(BytesStart::new("values")))?;
            for value in values {
                write_simple(&mut writer, "value", &value)?;
            }
            writer.write_event(Event::End(BytesEnd::new("values")))?;
            writer.write_event(Event::End(BytesEnd::new("entry")))?;
        }
        writer.write_event(Event::End(BytesEnd::new(scanner.as_str())))?;
    }

    writer.write_event(Event::End(BytesEnd::new(ROOT)))?;
    let mut xml = String::from_utf8(writer.into_inner().into_inner())?;
    if !xml.ends_with('\n') {
        xml.push('\n');
    }
    Ok(xml)
}

fn write_simple(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag: &str,
    value: &str,
) -> std::result::Result<(), XmlError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Element depths below the root: scanner, entry, key/values, value.
const SCANNER_DEPTH: usize = 1;
const ENTRY_DEPTH: usize = 2;
const KEY_DEPTH: usize = 3;
const VALUE_DEPTH: usize = 4;

pub(super) fn decode(text: &str, origin: &str) -> Result<Store> {
    let mut reader = Reader::from_str(text);

    let mut snapshot = StoreSnapshot::new();
    let mut path: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut key: Option<String> = None;
    let mut values = BTreeSet::new();
    let mut content = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| TypedexError::decode(origin, err))?;
        match event {
            Event::Start(element) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                open_element(&mut snapshot, &path, &name, &mut seen_root, origin)?;
                content.clear();
                path.push(name);
            }
            Event::Empty(element) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                open_element(&mut snapshot, &path, &name, &mut seen_root, origin)?;
                match (name.as_str(), path.len()) {
                    ("key", KEY_DEPTH) => key = Some(String::new()),
                    ("value", VALUE_DEPTH) => {
                        values.insert(String::new());
                    }
                    _ => {}
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|err| TypedexError::decode(origin, err))?;
                content.push_str(&text);
            }
            Event::CData(data) => {
                content.push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Event::End(_) => {
                let Some(name) = path.pop() else {
                    return Err(TypedexError::decode(origin, "unbalanced closing element"));
                };
                match (name.as_str(), path.len()) {
                    ("key", KEY_DEPTH) => key = Some(mem::take(&mut content)),
                    ("value", VALUE_DEPTH) => {
                        values.insert(mem::take(&mut content));
                    }
                    ("entry", ENTRY_DEPTH) => {
                        let scanner = &path[SCANNER_DEPTH];
                        let key = key.take().ok_or_else(|| {
                            TypedexError::decode(origin, format!("entry of {scanner} has no key"))
                        })?;
                        snapshot
                            .entry(scanner.clone())
                            .or_default()
                            .entry(key)
                            .or_default()
                            .extend(mem::take(&mut values));
                    }
                    _ => {}
                }
                content.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(TypedexError::decode(origin, format!("missing <{ROOT}> element")));
    }
    if !path.is_empty() {
        return Err(TypedexError::decode(origin, "document ended inside an element"));
    }
    Ok(Store::from_snapshot(snapshot))
}

fn open_element(
    snapshot: &mut StoreSnapshot,
    path: &[String],
    name: &str,
    seen_root: &mut bool,
    origin: &str,
) -> Result<()> {
    match path.len() {
        0 if name == ROOT && !*seen_root => *seen_root = true,
        0 => {
            return Err(TypedexError::decode(
                origin,
                format!("expected a single <{ROOT}> root, found <{name}>"),
            ));
        }
        SCANNER_DEPTH => {
            snapshot.entry(name.to_string()).or_default();
        }
        _ => {}
    }
    Ok(())
}
