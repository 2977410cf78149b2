//! Decoding transformations.

use super::Transformation;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use std::borrow::Cow;

/// URL decode (`+` becomes a space, `%HH` becomes the byte).
///
/// Malformed escapes are kept verbatim.
pub struct UrlDecode;

impl Transformation for UrlDecode {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.contains(&['%', '+'][..]) {
            return Cow::Borrowed(input);
        }
        Cow::Owned(percent_decode(input))
    }

    fn name(&self) -> &'static str {
        "urlDecode"
    }
}

/// URL decode that also understands the IIS `%uHHHH` form.
pub struct UrlDecodeUni;

impl Transformation for UrlDecodeUni {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.contains(&['%', '+'][..]) {
            return Cow::Borrowed(input);
        }
        Cow::Owned(percent_decode(&expand_unicode_escapes(input)))
    }

    fn name(&self) -> &'static str {
        "urlDecodeUni"
    }
}

fn percent_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_encoding::percent_decode_str(&spaced)
        .decode_utf8_lossy()
        .into_owned()
}

/// Replace `%uHHHH` escapes with the code point; anything else is kept.
fn expand_unicode_escapes(input: &str) -> Cow<'_, str> {
    if !input.contains("%u") && !input.contains("%U") {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let code = tail
            .get(1..2)
            .filter(|u| u.eq_ignore_ascii_case("u"))
            .and_then(|_| tail.get(2..6))
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .and_then(char::from_u32);
        match code {
            Some(c) => {
                out.push(c);
                rest = &tail[6..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn hex_val(b: &u8) -> Option<u8> {
    (*b as char).to_digit(16).map(|d| d as u8)
}

/// Base64 decode. Input that is not valid base64 passes through unchanged.
pub struct Base64Decode;

impl Transformation for Base64Decode {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let decoded = STANDARD
            .decode(&compact)
            .or_else(|_| STANDARD_NO_PAD.decode(compact.trim_end_matches('=')));
        match decoded {
            Ok(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => Cow::Borrowed(input),
        }
    }

    fn name(&self) -> &'static str {
        "base64Decode"
    }
}

/// Hex decode. Odd-length or non-hex input passes through unchanged.
pub struct HexDecode;

impl Transformation for HexDecode {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let bytes = input.as_bytes();
        if bytes.len() % 2 != 0 {
            return Cow::Borrowed(input);
        }

        let decoded: Option<Vec<u8>> = bytes
            .chunks_exact(2)
            .map(|pair| Some(hex_val(&pair[0])? << 4 | hex_val(&pair[1])?))
            .collect();

        match decoded {
            Some(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
            None => Cow::Borrowed(input),
        }
    }

    fn name(&self) -> &'static str {
        "hexDecode"
    }
}

/// HTML entity decode (named, decimal and hex references).
pub struct HtmlEntityDecode;

impl Transformation for HtmlEntityDecode {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.contains('&') {
            return Cow::Borrowed(input);
        }
        match html_escape::decode_html_entities(input) {
            Cow::Borrowed(_) => Cow::Borrowed(input),
            Cow::Owned(decoded) => Cow::Owned(decoded),
        }
    }

    fn name(&self) -> &'static str {
        "htmlEntityDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_decode() {
        assert_eq!(UrlDecode.transform("a%20b+c"), "a b c");
        assert_eq!(UrlDecode.transform("%3Cscript%3E"), "<script>");
        assert_eq!(UrlDecode.transform("100%"), "100%");
        assert_eq!(UrlDecode.transform("%zz"), "%zz");
        assert!(matches!(UrlDecode.transform("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_url_decode_uni() {
        assert_eq!(UrlDecodeUni.transform("%u003cscript%u003e"), "<script>");
        assert_eq!(UrlDecodeUni.transform("%41%u0042"), "AB");
        assert_eq!(UrlDecodeUni.transform("%u00"), "%u00");
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(Base64Decode.transform("aGVsbG8="), "hello");
        assert_eq!(Base64Decode.transform("aGVsbG8"), "hello");
        assert_eq!(Base64Decode.transform("not base64!"), "not base64!");
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(HexDecode.transform("414243"), "ABC");
        assert_eq!(HexDecode.transform("41424"), "41424");
        assert_eq!(HexDecode.transform("zz"), "zz");
    }

    #[test]
    fn test_html_entity_decode() {
        assert_eq!(HtmlEntityDecode.transform("&lt;script&gt;"), "<script>");
        assert_eq!(HtmlEntityDecode.transform("&#60;&#x3e;"), "<>");
        assert_eq!(HtmlEntityDecode.transform("a & b"), "a & b");
    }
}
