//! Inspection targets: which variables a rule looks at.

use crate::error::{Error, Result};
use regex::Regex;

/// Variables the store can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Client address.
    RemoteAddr,
    /// Client port.
    RemotePort,
    /// Server address.
    ServerAddr,
    /// Server port.
    ServerPort,
    /// Request URI (with query string).
    RequestUri,
    /// HTTP method.
    RequestMethod,
    /// HTTP protocol.
    RequestProtocol,
    /// `METHOD URI PROTOCOL`.
    RequestLine,
    /// Request path (without query string).
    RequestFilename,
    /// Query string.
    QueryString,
    /// All arguments (GET and POST).
    Args,
    /// GET arguments only.
    ArgsGet,
    /// POST arguments only (form-encoded bodies).
    ArgsPost,
    /// Argument names.
    ArgsNames,
    /// Request headers.
    RequestHeaders,
    /// Request header names.
    RequestHeadersNames,
    /// Request cookies.
    RequestCookies,
    /// Accumulated request body.
    RequestBody,
    /// Request body length.
    RequestBodyLength,
    /// Response status code.
    ResponseStatus,
    /// Response protocol.
    ResponseProtocol,
    /// Response headers.
    ResponseHeaders,
    /// Response content type.
    ResponseContentType,
    /// Accumulated response body.
    ResponseBody,
    /// Transaction collection.
    Tx,
}

impl Variable {
    /// Canonical variable name.
    pub fn name(&self) -> &'static str {
        match self {
            Variable::RemoteAddr => "REMOTE_ADDR",
            Variable::RemotePort => "REMOTE_PORT",
            Variable::ServerAddr => "SERVER_ADDR",
            Variable::ServerPort => "SERVER_PORT",
            Variable::RequestUri => "REQUEST_URI",
            Variable::RequestMethod => "REQUEST_METHOD",
            Variable::RequestProtocol => "REQUEST_PROTOCOL",
            Variable::RequestLine => "REQUEST_LINE",
            Variable::RequestFilename => "REQUEST_FILENAME",
            Variable::QueryString => "QUERY_STRING",
            Variable::Args => "ARGS",
            Variable::ArgsGet => "ARGS_GET",
            Variable::ArgsPost => "ARGS_POST",
            Variable::ArgsNames => "ARGS_NAMES",
            Variable::RequestHeaders => "REQUEST_HEADERS",
            Variable::RequestHeadersNames => "REQUEST_HEADERS_NAMES",
            Variable::RequestCookies => "REQUEST_COOKIES",
            Variable::RequestBody => "REQUEST_BODY",
            Variable::RequestBodyLength => "REQUEST_BODY_LENGTH",
            Variable::ResponseStatus => "RESPONSE_STATUS",
            Variable::ResponseProtocol => "RESPONSE_PROTOCOL",
            Variable::ResponseHeaders => "RESPONSE_HEADERS",
            Variable::ResponseContentType => "RESPONSE_CONTENT_TYPE",
            Variable::ResponseBody => "RESPONSE_BODY",
            Variable::Tx => "TX",
        }
    }

    /// Look up a variable by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let var = match upper.as_str() {
            "REMOTE_ADDR" => Variable::RemoteAddr,
            "REMOTE_PORT" => Variable::RemotePort,
            "SERVER_ADDR" => Variable::ServerAddr,
            "SERVER_PORT" => Variable::ServerPort,
            "REQUEST_URI" => Variable::RequestUri,
            "REQUEST_METHOD" => Variable::RequestMethod,
            "REQUEST_PROTOCOL" => Variable::RequestProtocol,
            "REQUEST_LINE" => Variable::RequestLine,
            "REQUEST_FILENAME" => Variable::RequestFilename,
            "QUERY_STRING" => Variable::QueryString,
            "ARGS" => Variable::Args,
            "ARGS_GET" => Variable::ArgsGet,
            "ARGS_POST" => Variable::ArgsPost,
            "ARGS_NAMES" => Variable::ArgsNames,
            "REQUEST_HEADERS" => Variable::RequestHeaders,
            "REQUEST_HEADERS_NAMES" => Variable::RequestHeadersNames,
            "REQUEST_COOKIES" => Variable::RequestCookies,
            "REQUEST_BODY" => Variable::RequestBody,
            "REQUEST_BODY_LENGTH" => Variable::RequestBodyLength,
            "RESPONSE_STATUS" => Variable::ResponseStatus,
            "RESPONSE_PROTOCOL" => Variable::ResponseProtocol,
            "RESPONSE_HEADERS" => Variable::ResponseHeaders,
            "RESPONSE_CONTENT_TYPE" => Variable::ResponseContentType,
            "RESPONSE_BODY" => Variable::ResponseBody,
            "TX" => Variable::Tx,
            _ => return None,
        };
        Some(var)
    }

    /// Whether the variable is a keyed collection.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Variable::Args
                | Variable::ArgsGet
                | Variable::ArgsPost
                | Variable::RequestHeaders
                | Variable::RequestCookies
                | Variable::ResponseHeaders
                | Variable::Tx
        )
    }
}

/// Selection mode for collection variables.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Static key selection (ARGS:foo).
    Key(String),
    /// Regex key selection (ARGS:/^user/), compiled with the rule.
    Regex(Regex),
}

/// One inspected variable of a matcher, with its selection.
#[derive(Debug, Clone)]
pub struct Target {
    /// The variable.
    pub variable: Variable,
    /// Optional key selection.
    pub selection: Option<Selection>,
    /// Count mode: resolve to the number of values instead of the values.
    pub count: bool,
    /// Keys excluded from the resolution.
    pub exclusions: Vec<String>,
}

impl Target {
    /// Inspect every value of a variable.
    pub fn new(variable: Variable) -> Self {
        Self {
            variable,
            selection: None,
            count: false,
            exclusions: Vec::new(),
        }
    }

    /// Inspect a single key of a collection.
    pub fn key(variable: Variable, key: impl Into<String>) -> Self {
        Self {
            selection: Some(Selection::Key(key.into())),
            ..Self::new(variable)
        }
    }

    /// Inspect the keys of a collection matching a pattern.
    pub fn regex(variable: Variable, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|source| Error::RegexCompile {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            selection: Some(Selection::Regex(re)),
            ..Self::new(variable)
        })
    }

    /// Parse the rule-language form: `ARGS`, `ARGS:id`, `ARGS:/^user/`,
    /// `&ARGS` (count).
    pub fn parse(spec: &str) -> Result<Self> {
        let (count, spec) = match spec.strip_prefix('&') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let (name, selector) = match spec.split_once(':') {
            Some((name, selector)) => (name, Some(selector)),
            None => (spec, None),
        };
        let variable = Variable::from_name(name).ok_or_else(|| Error::UnknownVariable {
            name: name.to_string(),
        })?;

        let target = match selector {
            Some(sel) if sel.len() > 1 && sel.starts_with('/') && sel.ends_with('/') => {
                Target::regex(variable, &sel[1..sel.len() - 1])?
            }
            Some(key) => Target::key(variable, key),
            None => Target::new(variable),
        };
        Ok(Self { count, ..target })
    }

    /// Parse an exclusion, `!ARGS:password`, into the variable and the key
    /// it removes.
    pub fn parse_exclusion(spec: &str) -> Result<(Variable, String)> {
        let invalid = |message: &str| Error::InvalidTarget {
            spec: spec.to_string(),
            message: message.to_string(),
        };
        let rest = spec
            .strip_prefix('!')
            .ok_or_else(|| invalid("exclusions start with '!'"))?;
        let (name, key) = rest
            .split_once(':')
            .ok_or_else(|| invalid("exclusions name a key"))?;
        if key.is_empty() {
            return Err(invalid("exclusions name a key"));
        }
        let variable = Variable::from_name(name).ok_or_else(|| Error::UnknownVariable {
            name: name.to_string(),
        })?;
        Ok((variable, key.to_string()))
    }

    /// Resolve to a count of values (existence checks).
    pub fn counted(mut self) -> Self {
        self.count = true;
        self
    }

    /// Exclude a key from the resolution.
    pub fn exclude(mut self, key: impl Into<String>) -> Self {
        self.exclusions.push(key.into());
        self
    }
}

impl From<Variable> for Target {
    fn from(variable: Variable) -> Self {
        Target::new(variable)
    }
}
