//! Section tree walk: paragraphs accumulate until an image truncates them.
//!
//! The walk threads a pending-paragraph list and a running chapter-global
//! index through a pre-order traversal. Every successfully fetched image
//! flushes the pending paragraphs through the chunker with the image attached
//! to the first resulting layer, so `index` always names the position of the
//! next content unit.

use std::io;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::chunk::{MAX_LAYER_LENGTH, chunk_with_limit};
use crate::dom::{Dom, NodeId, NodeKind};
use crate::epub::Container;
use crate::error::ImageError;
use crate::import::resolve_image_path;
use crate::model::{ContentLayer, ImageHandle, ResourceRegistry};
use crate::util::detect_image_mime;

/// Subtrees that never carry readable content.
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "template", "noscript"];

fn is_paragraph_like(tag: &str) -> bool {
    matches!(tag, "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Walk state for one section.
pub struct SectionWalker<'a> {
    section_path: &'a str,
    container: &'a dyn Container,
    resources: &'a ResourceRegistry,
    max_layer_length: usize,
    pending: Vec<String>,
    index: usize,
    layers: Vec<ContentLayer>,
}

impl<'a> SectionWalker<'a> {
    pub fn new(
        section_path: &'a str,
        container: &'a dyn Container,
        resources: &'a ResourceRegistry,
    ) -> Self {
        Self {
            section_path,
            container,
            resources,
            max_layer_length: MAX_LAYER_LENGTH,
            pending: Vec::new(),
            index: 0,
            layers: Vec::new(),
        }
    }

    pub fn with_max_layer_length(mut self, max_layer_length: usize) -> Self {
        self.max_layer_length = max_layer_length;
        self
    }

    /// Walk `dom` from its `<body>` (or the document root) and return the
    /// chapter layers.
    pub fn walk(mut self, dom: &Dom) -> Vec<ContentLayer> {
        let root = dom.find_by_tag("body").unwrap_or_else(|| dom.document());
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            match dom.kind(id) {
                NodeKind::Text(text) => self.push_text(text),
                NodeKind::Element(tag) if SKIPPED_TAGS.contains(&tag) => {}
                NodeKind::Element("img") => self.image(dom.attr(id, "src")),
                NodeKind::Element("image") => self.image(dom.attr(id, "href")),
                NodeKind::Element(tag) if is_paragraph_like(tag) && !contains_image(dom, id) => {
                    self.push_text(&dom.text_content(id));
                }
                NodeKind::Element(_) | NodeKind::Document => {
                    let children: Vec<NodeId> = dom.children(id).collect();
                    stack.extend(children.into_iter().rev());
                }
                NodeKind::Other => {}
            }
        }

        self.finish()
    }

    fn push_text(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.pending.push(trimmed.to_string());
        }
    }

    fn image(&mut self, src: Option<&str>) {
        let Some(src) = src.map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };

        match self.fetch_image(src) {
            Ok(handle) => {
                let pending = std::mem::take(&mut self.pending);
                self.flush(pending, Some(handle));
            }
            // Pending paragraphs carry forward to the next flush.
            Err(err) => warn!(
                section = self.section_path,
                src = %abbreviate(src),
                "Skipping image: {err}"
            ),
        }
    }

    fn flush(&mut self, paragraphs: Vec<String>, image: Option<ImageHandle>) {
        let (layers, next) =
            chunk_with_limit(paragraphs, self.index, image, self.max_layer_length);
        self.index = next;
        self.layers.extend(layers);
    }

    fn finish(mut self) -> Vec<ContentLayer> {
        let pending = std::mem::take(&mut self.pending);
        self.flush(pending, None);
        debug!(
            section = self.section_path,
            layers = self.layers.len(),
            units = self.index,
            "Walked section"
        );
        self.layers
    }

    fn fetch_image(&self, src: &str) -> Result<ImageHandle, ImageError> {
        if let Some(data_uri) = src.strip_prefix("data:") {
            let (media_type, data) = decode_data_uri(data_uri)?;
            return Ok(self.resources.mint(data, media_type));
        }

        let path = resolve_image_path(self.section_path, src)?;
        let data = self.container.request(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ImageError::Missing(path.clone()),
            _ => ImageError::InvalidData(format!("{path}: {err}")),
        })?;
        let media_type = detect_image_mime(&path, &data);
        Ok(self.resources.mint(data, media_type))
    }
}

/// Walk one parsed section into layers with the default layer length.
pub fn walk_section(
    dom: &Dom,
    section_path: &str,
    container: &dyn Container,
    resources: &ResourceRegistry,
) -> Vec<ContentLayer> {
    SectionWalker::new(section_path, container, resources).walk(dom)
}

fn contains_image(dom: &Dom, id: NodeId) -> bool {
    dom.any_descendant(id, |child| matches!(dom.tag(child), Some("img" | "image")))
}

/// Decode the part of a `data:` URI after the scheme.
fn decode_data_uri(rest: &str) -> Result<(String, Vec<u8>), ImageError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::InvalidData("data URI without payload".to_string()))?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };
    let media_type = match media_type.split(';').next() {
        Some(mt) if !mt.is_empty() => mt.to_string(),
        _ => "application/octet-stream".to_string(),
    };

    let data = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64
            .decode(compact.as_bytes())
            .map_err(|e| ImageError::InvalidData(e.to_string()))?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok((media_type, data))
}

/// Keep log lines short when the source is an inline data URI.
fn abbreviate(src: &str) -> &str {
    match src.char_indices().nth(64) {
        Some((cut, _)) => &src[..cut],
        None => src,
    }
}
