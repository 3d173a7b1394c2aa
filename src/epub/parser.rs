//! EPUB parsing utilities (container.xml, OPF, NCX, EPUB3 navigation).

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::util::strip_bom;

/// Parsed OPF package data.
#[derive(Debug, Default)]
pub struct OpfData {
    pub title: String,
    pub authors: Vec<String>,
    /// Maps manifest id -> item.
    pub manifest: HashMap<String, ManifestItem>,
    /// Spine idrefs in reading order.
    pub spine_ids: Vec<String>,
    /// Manifest href of the NCX named by `spine@toc`.
    pub ncx_href: Option<String>,
    /// Manifest href of the EPUB3 navigation document.
    pub nav_href: Option<String>,
    /// Manifest href of the cover image.
    pub cover_href: Option<String>,
}

impl OpfData {
    /// Hrefs of the spine items, in reading order. Unknown idrefs are skipped.
    pub fn spine_hrefs(&self) -> impl Iterator<Item = &str> {
        self.spine_ids
            .iter()
            .filter_map(|id| self.manifest.get(id).map(|item| item.href.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == name))
    }
}

/// A table of contents entry (hierarchical).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }
}

/// Flatten a TOC tree depth-first, parents before their children.
pub fn flatten_toc(entries: &[TocEntry]) -> Vec<&TocEntry> {
    fn walk<'a>(entries: &'a [TocEntry], out: &mut Vec<&'a TocEntry>) {
        for entry in entries {
            out.push(entry);
            walk(&entry.children, out);
        }
    }

    let mut out = Vec::new();
    walk(entries, &mut out);
    out
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8_lossy(strip_bom(bytes));

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attr_value(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::MissingElement(
        "rootfile in META-INF/container.xml".to_string(),
    ))
}

/// Parse OPF package document.
pub fn parse_opf(content: &str) -> Result<OpfData> {
    // No trim_text: entity references split text events and trimming each
    // piece would eat the spaces around them.
    let mut reader = Reader::from_str(content);

    let mut opf = OpfData::default();
    let mut toc_id: Option<String> = None;
    let mut epub2_cover_id: Option<String> = None;
    let mut saw_package = false;

    let mut in_metadata = false;
    let mut current_element: Option<&'static str> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"package" => saw_package = true,
                    b"metadata" => in_metadata = true,
                    b"title" if in_metadata => current_element = Some("title"),
                    b"creator" if in_metadata => current_element = Some("creator"),
                    b"spine" => toc_id = attr_value(&e, b"toc"),
                    _ => {}
                }
                buf_text.clear();
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => {
                        let id = attr_value(&e, b"id").unwrap_or_default();
                        if !id.is_empty() {
                            opf.manifest.insert(
                                id,
                                ManifestItem {
                                    href: attr_value(&e, b"href").unwrap_or_default(),
                                    media_type: attr_value(&e, b"media-type").unwrap_or_default(),
                                    properties: attr_value(&e, b"properties"),
                                },
                            );
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attr_value(&e, b"idref") {
                            opf.spine_ids.push(idref);
                        }
                    }
                    b"meta" => {
                        if attr_value(&e, b"name").as_deref() == Some("cover")
                            && let Some(content) = attr_value(&e, b"content")
                            && !content.is_empty()
                        {
                            epub2_cover_id = Some(content);
                        }
                    }
                    b"spine" => toc_id = attr_value(&e, b"toc"),
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current_element.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                if local_name(e.name().as_ref()) == b"metadata" {
                    in_metadata = false;
                }

                if let Some(elem) = current_element.take() {
                    let value = buf_text.trim().to_string();
                    match elem {
                        "title" if opf.title.is_empty() => opf.title = value,
                        "creator" if !value.is_empty() => opf.authors.push(value),
                        _ => {}
                    }
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_package {
        return Err(Error::MissingElement("package in OPF".to_string()));
    }

    // EPUB3 property takes priority over the EPUB2 meta
    opf.cover_href = opf
        .manifest
        .values()
        .find(|item| item.has_property("cover-image"))
        .or_else(|| epub2_cover_id.and_then(|id| opf.manifest.get(&id)))
        .map(|item| item.href.clone());

    opf.nav_href = opf
        .manifest
        .values()
        .find(|item| item.has_property("nav"))
        .map(|item| item.href.clone());

    opf.ncx_href = toc_id
        .and_then(|id| opf.manifest.get(&id))
        .or_else(|| {
            opf.manifest
                .values()
                .find(|item| item.media_type == "application/x-dtbncx+xml")
        })
        .map(|item| item.href.clone());

    Ok(opf)
}

/// Parse NCX table of contents.
pub fn parse_ncx(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);

    struct NavPointState {
        children: Vec<TocEntry>,
        text: String,
        src: Option<String>,
    }

    let mut stack: Vec<NavPointState> = vec![NavPointState {
        children: Vec::new(),
        text: String::new(),
        src: None,
    }];
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => stack.push(NavPointState {
                    children: Vec::new(),
                    text: String::new(),
                    src: None,
                }),
                b"text" => in_text = true,
                b"content" => {
                    if let Some(state) = stack.last_mut() {
                        state.src = attr_value(&e, b"src");
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content"
                    && let Some(state) = stack.last_mut()
                {
                    state.src = attr_value(&e, b"src");
                }
            }
            Event::Text(e) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text
                    && let Some(state) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    state.text.push_str(&resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navPoint" => {
                    if stack.len() > 1
                        && let Some(state) = stack.pop()
                    {
                        let title = collapse_whitespace(&state.text);
                        let parent = stack.last_mut().map(|p| &mut p.children);
                        match (state.src, parent) {
                            (Some(src), Some(siblings)) => {
                                let mut entry = TocEntry::new(title, src);
                                entry.children = state.children;
                                siblings.push(entry);
                            }
                            // Keep reachable children of a navPoint without a target
                            (None, Some(siblings)) => siblings.extend(state.children),
                            _ => {}
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(stack.into_iter().next().map(|s| s.children).unwrap_or_default())
}

/// Parse the `toc` navigation of an EPUB3 navigation document.
///
/// Falls back to the first `<nav>` when none is typed `toc`.
pub fn parse_nav(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);

    struct ItemState {
        children: Vec<TocEntry>,
        text: String,
        href: Option<String>,
    }

    let mut toc: Option<Vec<TocEntry>> = None;
    let mut first_untyped: Option<Vec<TocEntry>> = None;

    // Active <nav>: whether it is the toc nav, plus the <li> stack.
    let mut nav: Option<(bool, Vec<ItemState>)> = None;
    let mut in_anchor = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"nav" if nav.is_none() => {
                        let is_toc = attr_value(&e, b"type")
                            .is_some_and(|t| t.split_ascii_whitespace().any(|v| v == "toc"));
                        nav = Some((
                            is_toc,
                            vec![ItemState {
                                children: Vec::new(),
                                text: String::new(),
                                href: None,
                            }],
                        ));
                    }
                    b"li" => {
                        if let Some((_, items)) = nav.as_mut() {
                            items.push(ItemState {
                                children: Vec::new(),
                                text: String::new(),
                                href: None,
                            });
                        }
                    }
                    b"a" => {
                        if let Some((_, items)) = nav.as_mut()
                            && let Some(item) = items.last_mut()
                            && item.href.is_none()
                        {
                            item.href = attr_value(&e, b"href");
                            in_anchor = true;
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if in_anchor
                    && let Some((_, items)) = nav.as_mut()
                    && let Some(item) = items.last_mut()
                {
                    item.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_anchor
                    && let Some((_, items)) = nav.as_mut()
                    && let Some(item) = items.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    item.text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"a" => in_anchor = false,
                    b"li" => {
                        if let Some((_, items)) = nav.as_mut()
                            && items.len() > 1
                            && let Some(item) = items.pop()
                            && let Some(parent) = items.last_mut()
                        {
                            match item.href {
                                Some(href) => {
                                    let mut entry =
                                        TocEntry::new(collapse_whitespace(&item.text), href);
                                    entry.children = item.children;
                                    parent.children.push(entry);
                                }
                                None => parent.children.extend(item.children),
                            }
                        }
                    }
                    b"nav" => {
                        if let Some((is_toc, items)) = nav.take() {
                            let entries = items
                                .into_iter()
                                .next()
                                .map(|root| root.children)
                                .unwrap_or_default();
                            if is_toc && toc.is_none() {
                                toc = Some(entries);
                            } else if first_untyped.is_none() {
                                first_untyped = Some(entries);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(toc.or(first_untyped).unwrap_or_default())
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Value of the attribute whose local name is `key`.
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr: &Attribute<'_>| local_name(attr.key.as_ref()) == key)
        .map(|attr| String::from_utf8_lossy(attr.value.as_ref()).into_owned())
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };

    code.and_then(char::from_u32).map(|c| c.to_string())
}
