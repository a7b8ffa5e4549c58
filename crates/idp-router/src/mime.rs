//! MIME sniffing: explicit metadata wins, then magic-byte detection on inline
//! content, then a file-extension guess, then `application/octet-stream`.

use base64::Engine;
use serde_json::Value;

pub const INLINE_PAYLOAD_KEYS: [&str; 5] = [
    "documentBytes",
    "document_bytes",
    "documentContent",
    "document_content",
    "payload",
];

const INLINE_METADATA_KEYS: [&str; 2] = ["inlineContent", "inline_content"];

/// Decodes a JSON value that is either base64 text or a raw UTF-8 string into bytes.
fn coerce_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .ok()
            .or_else(|| Some(s.as_bytes().to_vec())),
        _ => None,
    }
}

/// Looks for inline document bytes under the known payload/metadata keys.
#[must_use]
pub fn extract_inline_bytes(body: &Value) -> Option<Vec<u8>> {
    let obj = body.as_object()?;

    for key in INLINE_PAYLOAD_KEYS {
        if let Some(value) = obj.get(key) {
            if let Some(bytes) = coerce_bytes(value) {
                if !bytes.is_empty() {
                    return Some(bytes);
                }
            }
        }
    }

    if let Some(metadata) = obj.get("documentMetadata").and_then(Value::as_object) {
        for key in INLINE_METADATA_KEYS {
            if let Some(value) = metadata.get(key) {
                if let Some(bytes) = coerce_bytes(value) {
                    if !bytes.is_empty() {
                        return Some(bytes);
                    }
                }
            }
        }
    }

    None
}

/// Sniffs the MIME type of a document: explicit metadata, then inline-byte
/// magic detection, then a file-extension guess, then a generic default.
#[must_use]
pub fn sniff_mime_type(object_key: &str, body: &Value) -> String {
    if let Some(metadata) = body.get("documentMetadata").and_then(Value::as_object) {
        if let Some(mime) = metadata
            .get("contentType")
            .or_else(|| metadata.get("mimeType"))
            .and_then(Value::as_str)
        {
            return mime.to_string();
        }
    }

    if let Some(bytes) = extract_inline_bytes(body) {
        if let Some(detected) = detect_mime_from_bytes(&bytes) {
            return detected;
        }
    }

    guess_from_extension(object_key).unwrap_or_else(|| "application/octet-stream".to_string())
}

fn guess_from_extension(object_key: &str) -> Option<String> {
    let lower = object_key.to_ascii_lowercase();
    let ext = lower.rsplit('.').next()?;
    let mime = match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "eml" => "message/rfc822",
        "msg" => "application/vnd.ms-outlook",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Detects a MIME type from magic bytes: PDF, OLE (legacy Office), ZIP-based
/// Office Open XML, HTML, XML, a raw email header block, else an ASCII-heavy
/// plaintext heuristic.
#[must_use]
pub fn detect_mime_from_bytes(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }

    let header = &data[..data.len().min(8)];
    if header.starts_with(b"%PDF-") {
        return Some("application/pdf".to_string());
    }
    if header.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        return Some("application/msword".to_string());
    }
    if header.starts_with(b"PK\x03\x04") {
        return Some(detect_office_open_xml(data));
    }

    let snippet_len = data.len().min(2048);
    let snippet = String::from_utf8_lossy(&data[..snippet_len]);
    let trimmed = snippet.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with("<!doctype html") || lowered.starts_with("<html") || lowered[..lowered.len().min(200)].contains("<html") {
        return Some("text/html".to_string());
    }
    if lowered.starts_with("<?xml") {
        return Some("application/xml".to_string());
    }
    if lowered.starts_with("from:") || lowered.starts_with("received:") {
        return Some("message/rfc822".to_string());
    }

    let sample = &data[..data.len().min(128)];
    if !sample.is_empty() {
        let ascii_like = sample
            .iter()
            .filter(|&&b| (32..=126).contains(&b) || matches!(b, 9 | 10 | 13))
            .count() as f64
            / sample.len() as f64;
        if ascii_like > 0.9 {
            return Some("text/plain".to_string());
        }
    }

    None
}

fn detect_office_open_xml(data: &[u8]) -> String {
    let Ok(mut archive) = zip::ZipArchive::new(std::io::Cursor::new(data)) else {
        return "application/zip".to_string();
    };
    let names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_ascii_lowercase()))
        .collect();
    if names.iter().any(|n| n.starts_with("word/")) {
        return "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string();
    }
    if names.iter().any(|n| n.starts_with("ppt/")) {
        return "application/vnd.openxmlformats-officedocument.presentationml.presentation".to_string();
    }
    if names.iter().any(|n| n.starts_with("xl/")) {
        return "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string();
    }
    "application/zip".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_content_type_wins_over_everything() {
        let body = json!({"documentMetadata": {"contentType": "application/custom"}, "documentBytes": "JVBERi0="});
        assert_eq!(sniff_mime_type("file.bin", &body), "application/custom");
    }

    #[test]
    fn detects_pdf_from_inline_base64() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.7\n...");
        let body = json!({"documentBytes": encoded});
        assert_eq!(sniff_mime_type("unknown.bin", &body), "application/pdf");
    }

    #[test]
    fn falls_back_to_extension_guess() {
        let body = json!({});
        assert_eq!(sniff_mime_type("report.pdf", &body), "application/pdf");
    }

    #[test]
    fn defaults_to_octet_stream() {
        let body = json!({});
        assert_eq!(sniff_mime_type("mystery", &body), "application/octet-stream");
    }

    #[test]
    fn detects_ole_header_as_msword() {
        let data = [0xD0u8, 0xCF, 0x11, 0xE0, 0, 0, 0, 0];
        assert_eq!(detect_mime_from_bytes(&data).as_deref(), Some("application/msword"));
    }

    #[test]
    fn sniff_is_deterministic() {
        let body = json!({"documentMetadata": {"contentType": "text/plain"}});
        assert_eq!(sniff_mime_type("a.txt", &body), sniff_mime_type("a.txt", &body));
    }
}
