//! EPUB packaging documents (container.xml and the OPF package file).
//!
//! Only the pieces pagination needs are modeled: the package version, the
//! title for logging, the manifest, and the spine reading order.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};

/// One manifest `<item>`.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    /// Whether the `properties` whitespace list carries the given property.
    pub fn has_property(&self, prop: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|p| p.split_ascii_whitespace().any(|p| p == prop))
    }
}

/// Parsed OPF package data.
#[derive(Debug, Default)]
pub struct PackageDoc {
    /// The `version` attribute of the `<package>` element, e.g. "3.0".
    pub version: String,
    /// The first `dc:title`, for logging.
    pub title: Option<String>,
    pub manifest: Vec<ManifestItem>,
    /// Manifest ids in spine order.
    pub spine_ids: Vec<String>,
}

impl PackageDoc {
    pub fn item_by_id(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|i| i.id == id)
    }

    /// The EPUB3 navigation document, marked `properties="nav"`.
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|i| i.has_property("nav"))
    }

    /// Major version of the package, 0 when the attribute is unparseable.
    pub fn major_version(&self) -> u32 {
        self.version
            .split('.')
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Err(Error::MissingElement(
        "rootfile in container.xml".to_string(),
    ))
}

/// Parse the OPF package document.
pub fn parse_opf(content: &str) -> Result<PackageDoc> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut doc = PackageDoc::default();
    let mut in_title = false;
    let mut title_text = String::new();

    loop {
        match reader.read_event() {
            // Manifest and spine entries turn up both self-closed and as
            // start/end pairs in the wild, so both event kinds feed the
            // same handlers.
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"package" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"version" {
                                doc.version = String::from_utf8(attr.value.to_vec())?;
                            }
                        }
                    }
                    b"title" if doc.title.is_none() => {
                        in_title = true;
                        title_text.clear();
                    }
                    b"item" => push_item(&e, &mut doc)?,
                    b"itemref" => push_itemref(&e, &mut doc)?,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => push_item(&e, &mut doc)?,
                    b"itemref" => push_itemref(&e, &mut doc)?,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_title {
                    title_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if in_title && local_name(name.as_ref()) == b"title" {
                    in_title = false;
                    doc.title = Some(title_text.clone());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    if doc.version.is_empty() {
        return Err(Error::MissingElement(
            "version attribute on <package>".to_string(),
        ));
    }
    Ok(doc)
}

fn push_item(e: &quick_xml::events::BytesStart, doc: &mut PackageDoc) -> Result<()> {
    let mut item = ManifestItem {
        id: String::new(),
        href: String::new(),
        media_type: String::new(),
        properties: None,
    };
    for attr in e.attributes().flatten() {
        let value = String::from_utf8(attr.value.to_vec())?;
        match attr.key.as_ref() {
            b"id" => item.id = value,
            b"href" => item.href = value,
            b"media-type" => item.media_type = value,
            b"properties" => item.properties = Some(value),
            _ => {}
        }
    }
    if !item.id.is_empty() {
        doc.manifest.push(item);
    }
    Ok(())
}

fn push_itemref(e: &quick_xml::events::BytesStart, doc: &mut PackageDoc) -> Result<()> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"idref" {
            doc.spine_ids.push(String::from_utf8(attr.value.to_vec())?);
        }
    }
    Ok(())
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Extract local name from a namespaced XML name (e.g. "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
