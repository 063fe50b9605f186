//! Character encoding sniffing for byte input.
//!
//! Queries operate on `&str`; callers holding raw bytes (stdin, a socket
//! buffer, a file) decode them here first. The charset comes from the
//! document's own meta declaration, defaulting to UTF-8.

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::sync::LazyLock;

/// How many leading bytes are inspected for a charset declaration.
const SNIFF_LIMIT: usize = 1024;

/// `<meta charset=...>` or `<meta http-equiv=Content-Type content="...; charset=...">`
#[allow(clippy::expect_used)]
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+?charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).expect("valid regex")
});

/// Detect the character encoding declared in the document head.
///
/// Looks at the first 1024 bytes only. Unknown labels and missing
/// declarations fall back to UTF-8.
#[must_use]
pub fn detect_encoding(html: &[u8]) -> &'static Encoding {
    let head = String::from_utf8_lossy(&html[..html.len().min(SNIFF_LIMIT)]);
    declared_charset(&head)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8)
}

fn declared_charset(head: &str) -> Option<String> {
    META_CHARSET_RE
        .captures(head)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Decode HTML bytes to a UTF-8 string.
///
/// A leading byte-order mark wins over the meta declaration. Invalid
/// sequences become U+FFFD rather than failing.
///
/// # Example
///
/// ```rust
/// use dom_facade::encoding::decode_html;
///
/// let html = b"<meta charset=\"ISO-8859-1\"><p>Caf\xE9</p>";
/// assert!(decode_html(html).contains("Café"));
/// ```
#[must_use]
pub fn decode_html(html: &[u8]) -> String {
    let encoding = detect_encoding(html);
    let (decoded, used, had_errors) = encoding.decode(html);
    if had_errors {
        tracing::debug!(encoding = used.name(), "replaced undecodable bytes");
    }
    decoded.into_owned()
}
