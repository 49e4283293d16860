//! Browser string encodings the tag relies on
//!
//! `encodeURIComponent` for pixel query pairs and cookie values, and the
//! legacy `escape` for the `path` and `referrer` parameters.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters `encodeURIComponent` leaves untouched besides alphanumerics.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Inverse of [`encode_uri_component`]. Malformed sequences yield `None`.
pub fn decode_uri_component(input: &str) -> Option<String> {
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// The global `escape()` function: Latin-1 code units as `%XX`, everything
/// above as `%uXXXX` per UTF-16 unit.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for unit in input.encode_utf16() {
        match unit {
            0x30..=0x39 | 0x41..=0x5A | 0x61..=0x7A => out.push(unit as u8 as char),
            0x40 | 0x2A | 0x5F | 0x2B | 0x2D | 0x2E | 0x2F => out.push(unit as u8 as char),
            0..=0xFF => out.push_str(&format!("%{unit:02X}")),
            _ => out.push_str(&format!("%u{unit:04X}")),
        }
    }
    out
}
