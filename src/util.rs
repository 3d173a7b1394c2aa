//! Utility functions shared by the adapters.

use std::borrow::Cow;

/// Get current time as seconds since Unix epoch.
pub fn time_now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Stable identifier for a book: hex SHA-1 of its raw bytes.
pub fn content_id(bytes: &[u8]) -> String {
    sha1_smol::Sha1::from(bytes).digest().to_string()
}

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries strict UTF-8 (a leading BOM is stripped)
/// 2. If malformed, tries GB18030 (covers GBK and GB2312 text files)
/// 3. Falls back to lossy UTF-8, substituting U+FFFD
///
/// It never fails.
///
/// # Examples
///
/// ```
/// use layerbook::util::decode_text;
///
/// assert_eq!(decode_text("Hello".as_bytes()), "Hello");
/// // "中文" in GBK
/// assert_eq!(decode_text(&[0xD6, 0xD0, 0xCE, 0xC4]), "中文");
/// ```
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Some(text) = encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(
        strip_bom(bytes),
    ) {
        return text;
    }

    if let Some(text) =
        encoding_rs::GB18030.decode_without_bom_handling_and_without_replacement(bytes)
    {
        return text;
    }

    String::from_utf8_lossy(bytes)
}

/// Decode a markup document, honoring the XML declaration when the bytes are
/// not UTF-8.
pub fn decode_markup(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = extract_xml_encoding(bytes)
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    decode_text(bytes)
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Extract encoding from XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` within the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;

    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Detect an image MIME type from its path extension or magic bytes.
///
/// Returns `application/octet-stream` when the format is unknown.
pub fn detect_image_mime(path: &str, data: &[u8]) -> &'static str {
    let path_lower = path.to_lowercase();

    if path_lower.ends_with(".jpg") || path_lower.ends_with(".jpeg") {
        return "image/jpeg";
    }
    if path_lower.ends_with(".png") {
        return "image/png";
    }
    if path_lower.ends_with(".gif") {
        return "image/gif";
    }
    if path_lower.ends_with(".svg") {
        return "image/svg+xml";
    }
    if path_lower.ends_with(".webp") {
        return "image/webp";
    }

    if data.len() >= 4 {
        if data[0] == 0xFF && data[1] == 0xD8 {
            return "image/jpeg";
        }
        if data[..4] == [0x89, 0x50, 0x4E, 0x47] {
            return "image/png";
        }
        if data[..3] == *b"GIF" {
            return "image/gif";
        }
        if data.len() >= 12 && data[..4] == *b"RIFF" && data[8..12] == *b"WEBP" {
            return "image/webp";
        }
    }

    "application/octet-stream"
}
