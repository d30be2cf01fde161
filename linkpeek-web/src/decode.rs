//! Bytes -> text -> document, with the two fallbacks real pages need.
//!
//! Decoding tries the declared charset (UTF-8 when nothing is declared) and
//! then strict ASCII. Parsing goes through `scraper`; since an HTML5 parser
//! always recovers, a parse counts as failed when the tree holds nothing but
//! the implied `html`/`head`/`body` skeleton. A failed parse is retried on the
//! raw bytes forced through UTF-8. When every attempt fails the document is
//! absent, which is not an error: the caller falls back to MIME classification.

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use scraper::{ElementRef, Html};

/// Bytes scanned for an in-document charset declaration.
const PRESCAN_LIMIT: usize = 1024;

/// Resolve a charset label (WHATWG names and aliases). Unknown labels are
/// attempted as UTF-8.
pub fn encoding_for_label(label: &str) -> &'static Encoding {
    Encoding::for_label(label.trim().as_bytes()).unwrap_or_else(|| {
        tracing::debug!(charset = label, "decode.unknown_charset_as_utf8");
        UTF_8
    })
}

/// Decode with the declared charset, then ASCII. `None` when both fail.
///
/// Both attempts are strict: malformed input fails instead of being replaced.
pub fn decode_body(bytes: &[u8], declared: Option<&str>) -> Option<String> {
    let encoding = declared.map(encoding_for_label).unwrap_or(UTF_8);
    if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        return Some(text.into_owned());
    }
    tracing::debug!(charset = encoding.name(), "decode.retry_ascii");
    (Encoding::ascii_valid_up_to(bytes) == bytes.len())
        .then(|| UTF_8.decode_without_bom_handling(bytes).0.into_owned())
}

/// Parse text into a document, `None` when no markup survives parsing.
pub fn parse_document(text: &str) -> Option<Html> {
    let document = Html::parse_document(text);
    let has_markup = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| !matches!(el.value().name(), "html" | "head" | "body"));
    has_markup.then_some(document)
}

/// Full decode-then-parse pipeline for a response body.
pub fn load_document(bytes: &[u8], declared: Option<&str>) -> Option<Html> {
    let Some(text) = decode_body(bytes, declared) else {
        tracing::warn!(
            declared = declared.unwrap_or("utf-8"),
            body_len = bytes.len(),
            "decode.failed"
        );
        return None;
    };
    if let Some(document) = parse_document(&text) {
        return Some(document);
    }
    tracing::debug!("decode.retry_parse_utf8");
    let (forced, _) = UTF_8.decode_without_bom_handling(bytes);
    let document = parse_document(&forced);
    if document.is_none() {
        tracing::debug!(body_len = bytes.len(), "decode.no_document");
    }
    document
}

/// Find a charset declared inside the document (`<meta charset>` or an
/// `http-equiv` content type) within the first kilobyte.
pub fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(PRESCAN_LIMIT)]);
    let re = Regex::new(r#"(?i)<meta\b[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#).ok()?;
    re.captures(&head)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}
