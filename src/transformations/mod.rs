//! Value transformations applied before an operator runs.

mod decode;
mod normalize;
mod pipeline;

pub use decode::{Base64Decode, HexDecode, HtmlEntityDecode, UrlDecode, UrlDecodeUni};
pub use normalize::{
    CompressWhitespace, Lowercase, NormalizePath, RemoveNulls, RemoveWhitespace, Trim, Uppercase,
};
pub use pipeline::TransformationPipeline;

use crate::error::{Error, Result};
use phf::phf_map;
use std::borrow::Cow;
use std::sync::Arc;

/// A pure string-to-string rewrite.
pub trait Transformation: Send + Sync {
    /// Apply the transformation, borrowing the input when nothing changes.
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str>;

    /// Canonical name.
    fn name(&self) -> &'static str;
}

#[derive(Clone, Copy)]
enum TransformationKind {
    UrlDecode,
    UrlDecodeUni,
    Base64Decode,
    HexDecode,
    HtmlEntityDecode,
    Lowercase,
    Uppercase,
    CompressWhitespace,
    RemoveWhitespace,
    RemoveNulls,
    Trim,
    NormalizePath,
    Length,
    None,
}

static TRANSFORMATION_MAP: phf::Map<&'static str, TransformationKind> = phf_map! {
    "urldecode" => TransformationKind::UrlDecode,
    "urldecodeuni" => TransformationKind::UrlDecodeUni,
    "base64decode" => TransformationKind::Base64Decode,
    "hexdecode" => TransformationKind::HexDecode,
    "htmlentitydecode" => TransformationKind::HtmlEntityDecode,
    "lowercase" => TransformationKind::Lowercase,
    "uppercase" => TransformationKind::Uppercase,
    "compresswhitespace" => TransformationKind::CompressWhitespace,
    "removewhitespace" => TransformationKind::RemoveWhitespace,
    "removenulls" => TransformationKind::RemoveNulls,
    "trim" => TransformationKind::Trim,
    "normalizepath" => TransformationKind::NormalizePath,
    "length" => TransformationKind::Length,
    "none" => TransformationKind::None,
};

/// Look up a transformation by name (case-insensitive, optional `t:` prefix).
pub fn create_transformation(name: &str) -> Result<Arc<dyn Transformation>> {
    let key = name.strip_prefix("t:").unwrap_or(name).to_ascii_lowercase();
    let kind = TRANSFORMATION_MAP
        .get(key.as_str())
        .copied()
        .ok_or_else(|| Error::UnknownTransformation {
            name: name.to_string(),
        })?;

    Ok(match kind {
        TransformationKind::UrlDecode => Arc::new(UrlDecode),
        TransformationKind::UrlDecodeUni => Arc::new(UrlDecodeUni),
        TransformationKind::Base64Decode => Arc::new(Base64Decode),
        TransformationKind::HexDecode => Arc::new(HexDecode),
        TransformationKind::HtmlEntityDecode => Arc::new(HtmlEntityDecode),
        TransformationKind::Lowercase => Arc::new(Lowercase),
        TransformationKind::Uppercase => Arc::new(Uppercase),
        TransformationKind::CompressWhitespace => Arc::new(CompressWhitespace),
        TransformationKind::RemoveWhitespace => Arc::new(RemoveWhitespace),
        TransformationKind::RemoveNulls => Arc::new(RemoveNulls),
        TransformationKind::Trim => Arc::new(Trim),
        TransformationKind::NormalizePath => Arc::new(NormalizePath),
        TransformationKind::Length => Arc::new(Length),
        TransformationKind::None => Arc::new(NoTransformation),
    })
}

/// `t:none`: clears everything listed before it in a pipeline.
pub struct NoTransformation;

impl Transformation for NoTransformation {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(input)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Replaces the value with its byte length.
pub struct Length;

impl Transformation for Length {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        Cow::Owned(input.len().to_string())
    }

    fn name(&self) -> &'static str {
        "length"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(create_transformation("t:urlDecodeUni").unwrap().name(), "urlDecodeUni");
        assert_eq!(create_transformation("LOWERCASE").unwrap().name(), "lowercase");
        assert!(matches!(
            create_transformation("md5"),
            Err(Error::UnknownTransformation { .. })
        ));
    }

    #[test]
    fn test_length() {
        assert_eq!(Length.transform("hello"), "5");
        assert_eq!(Length.transform(""), "0");
    }
}
