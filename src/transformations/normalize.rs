//! Case, whitespace and path normalization.

use super::Transformation;
use std::borrow::Cow;

/// Borrow the input when a rewrite produced the same text.
fn unchanged_or<'a>(input: &'a str, output: String) -> Cow<'a, str> {
    if output == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(output)
    }
}

/// Lowercase.
pub struct Lowercase;

impl Transformation for Lowercase {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.chars().any(char::is_uppercase) {
            return Cow::Borrowed(input);
        }
        Cow::Owned(input.to_lowercase())
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

/// Uppercase.
pub struct Uppercase;

impl Transformation for Uppercase {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.chars().any(char::is_lowercase) {
            return Cow::Borrowed(input);
        }
        Cow::Owned(input.to_uppercase())
    }

    fn name(&self) -> &'static str {
        "uppercase"
    }
}

/// Collapse every whitespace run into a single space.
pub struct CompressWhitespace;

impl Transformation for CompressWhitespace {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut out = String::with_capacity(input.len());
        let mut in_run = false;
        for c in input.chars() {
            if c.is_whitespace() {
                if !in_run {
                    out.push(' ');
                }
                in_run = true;
            } else {
                out.push(c);
                in_run = false;
            }
        }
        unchanged_or(input, out)
    }

    fn name(&self) -> &'static str {
        "compressWhitespace"
    }
}

/// Drop all whitespace.
pub struct RemoveWhitespace;

impl Transformation for RemoveWhitespace {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.chars().any(char::is_whitespace) {
            return Cow::Borrowed(input);
        }
        Cow::Owned(input.chars().filter(|c| !c.is_whitespace()).collect())
    }

    fn name(&self) -> &'static str {
        "removeWhitespace"
    }
}

/// Drop NUL bytes.
pub struct RemoveNulls;

impl Transformation for RemoveNulls {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if input.contains('\0') {
            Cow::Owned(input.replace('\0', ""))
        } else {
            Cow::Borrowed(input)
        }
    }

    fn name(&self) -> &'static str {
        "removeNulls"
    }
}

/// Strip leading and trailing whitespace.
pub struct Trim;

impl Transformation for Trim {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(input.trim())
    }

    fn name(&self) -> &'static str {
        "trim"
    }
}

/// Resolve `.` and `..` segments and collapse repeated slashes.
///
/// Backslashes are treated as separators. A leading `/` is kept; `..`
/// never climbs above the root.
pub struct NormalizePath;

impl Transformation for NormalizePath {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if input.is_empty() {
            return Cow::Borrowed(input);
        }

        let path = input.replace('\\', "/");
        let absolute = path.starts_with('/');
        let trailing = path.len() > 1 && path.ends_with('/');

        let mut segments: Vec<&str> = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        let mut out = String::with_capacity(path.len());
        if absolute {
            out.push('/');
        }
        out.push_str(&segments.join("/"));
        if trailing && !segments.is_empty() {
            out.push('/');
        }
        unchanged_or(input, out)
    }

    fn name(&self) -> &'static str {
        "normalizePath"
    }
}
