//! URI shape checks shared by namespace validation, metadata locations and
//! configured URLs.
//!
//! These are syntactic checks only. Absolute `http`/`https` values are also run
//! through `http::Uri` so that a malformed authority is rejected up front.

use std::sync::LazyLock;

use regex::Regex;

/// `scheme ":"` prefix per RFC 3986 section 3.1.
static SCHEME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("scheme pattern is valid")
});

/// Returns the scheme of `value` if it starts with one, lower-cased.
#[must_use]
pub fn scheme_of(value: &str) -> Option<String> {
    SCHEME_PREFIX
        .find(value)
        .map(|m| value[..m.end() - 1].to_ascii_lowercase())
}

/// Returns `true` when `value` is an absolute URI (`scheme ":" rest`).
#[must_use]
pub fn is_absolute_uri(value: &str) -> bool {
    let Some(scheme) = scheme_of(value) else {
        return false;
    };
    let rest = &value[scheme.len() + 1..];
    if rest.is_empty() || !has_valid_characters(value) {
        return false;
    }
    match scheme.as_str() {
        "http" | "https" => value
            .parse::<http::Uri>()
            .is_ok_and(|uri| uri.authority().is_some()),
        _ => true,
    }
}

/// Returns `true` when `value` is either an absolute URI or a relative reference.
#[must_use]
pub fn is_uri_reference(value: &str) -> bool {
    if scheme_of(value).is_some() {
        return is_absolute_uri(value);
    }
    has_valid_characters(value)
}

/// Rejects whitespace, control characters, characters RFC 3986 never allows
/// unescaped, and malformed percent escapes. Non-ASCII text is accepted (IRI).
fn has_valid_characters(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    for (idx, c) in value.char_indices() {
        if idx < i {
            continue;
        }
        if c == '%' {
            let hex = bytes.get(idx + 1..idx + 3);
            if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i = idx + 3;
            continue;
        }
        if c.is_whitespace() || c.is_control() {
            return false;
        }
        if c.is_ascii() && !(c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=".contains(c)) {
            return false;
        }
    }
    true
}
