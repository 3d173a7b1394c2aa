//! Size-bounded layering of paragraph sequences.
//!
//! Paragraphs are accumulated greedily into a layer until the next one would
//! push the layer past the length limit. Paragraphs are never split, so a
//! single paragraph longer than the limit gets a layer of its own.

use crate::model::{ContentLayer, ImageHandle};

/// Default upper bound on the paragraph characters of a multi-paragraph layer.
pub const MAX_LAYER_LENGTH: usize = 15_000;

/// Split `paragraphs` into layers of at most [`MAX_LAYER_LENGTH`] characters.
///
/// Returns the layers and the next free chapter-global index.
pub fn chunk(
    paragraphs: Vec<String>,
    start_index: usize,
    image: Option<ImageHandle>,
) -> (Vec<ContentLayer>, usize) {
    chunk_with_limit(paragraphs, start_index, image, MAX_LAYER_LENGTH)
}

/// [`chunk`] with an explicit length limit.
///
/// `image` attaches to the first returned layer. With no paragraphs the
/// image becomes a single image-only layer; with neither, nothing is emitted
/// and `start_index` is returned unchanged.
pub fn chunk_with_limit(
    paragraphs: Vec<String>,
    start_index: usize,
    image: Option<ImageHandle>,
    max_len: usize,
) -> (Vec<ContentLayer>, usize) {
    let mut layers = Vec::new();
    let mut image = image;
    let mut next_index = start_index;

    if paragraphs.is_empty() {
        if let Some(image) = image {
            layers.push(ContentLayer::image_only(image, next_index));
            next_index += 1;
        }
        return (layers, next_index);
    }

    let mut pending: Vec<String> = Vec::new();
    let mut pending_len = 0usize;

    for paragraph in paragraphs {
        let len = paragraph.chars().count();
        if !pending.is_empty() && pending_len + len > max_len {
            let layer = ContentLayer::new(std::mem::take(&mut pending), next_index, image.take());
            next_index = layer.end_index();
            layers.push(layer);
            pending_len = 0;
        }
        pending_len += len;
        pending.push(paragraph);
    }

    let layer = ContentLayer::new(pending, next_index, image.take());
    next_index = layer.end_index();
    layers.push(layer);

    (layers, next_index)
}
