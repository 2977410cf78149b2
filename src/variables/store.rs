//! Per-transaction variable store and the phase data merged into it.

use super::collection::{Collection, OrderedCollection};
use super::target::Variable;
use crate::engine::Phase;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Data bundle supplied by the connector for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseData {
    /// Nothing new for this phase.
    Empty,
    /// Connection endpoints.
    Connection {
        /// Client address.
        client_ip: String,
        /// Client port.
        client_port: u16,
        /// Server address.
        server_ip: String,
        /// Server port.
        server_port: u16,
    },
    /// Request line components.
    Uri {
        /// Request URI (with query string).
        uri: String,
        /// HTTP method.
        method: String,
        /// HTTP protocol.
        protocol: String,
    },
    /// Request header name/value pairs.
    RequestHeaders(Vec<(String, String)>),
    /// A request body chunk.
    RequestBody(Vec<u8>),
    /// Response status line and headers.
    ResponseHeaders {
        /// Status code.
        status: u16,
        /// HTTP protocol.
        protocol: String,
        /// Header name/value pairs.
        headers: Vec<(String, String)>,
    },
    /// A response body chunk.
    ResponseBody(Vec<u8>),
}

impl PhaseData {
    /// Connection endpoints.
    pub fn connection(
        client_ip: impl Into<String>,
        client_port: u16,
        server_ip: impl Into<String>,
        server_port: u16,
    ) -> Self {
        PhaseData::Connection {
            client_ip: client_ip.into(),
            client_port,
            server_ip: server_ip.into(),
            server_port,
        }
    }

    /// Request line components.
    pub fn uri(
        uri: impl Into<String>,
        method: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        PhaseData::Uri {
            uri: uri.into(),
            method: method.into(),
            protocol: protocol.into(),
        }
    }

    /// Request headers.
    pub fn request_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PhaseData::RequestHeaders(collect_pairs(headers))
    }

    /// Response status line and headers.
    pub fn response_headers<I, K, V>(status: u16, protocol: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PhaseData::ResponseHeaders {
            status,
            protocol: protocol.into(),
            headers: collect_pairs(headers),
        }
    }

    /// Name of the bundle kind, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            PhaseData::Empty => "empty",
            PhaseData::Connection { .. } => "connection",
            PhaseData::Uri { .. } => "uri",
            PhaseData::RequestHeaders(_) => "request header",
            PhaseData::RequestBody(_) => "request body",
            PhaseData::ResponseHeaders { .. } => "response header",
            PhaseData::ResponseBody(_) => "response body",
        }
    }

    /// Whether this bundle may be supplied to `phase`.
    pub fn belongs_to(&self, phase: Phase) -> bool {
        match self {
            PhaseData::Empty => true,
            PhaseData::Connection { .. } => phase == Phase::Connection,
            PhaseData::Uri { .. } => phase == Phase::Uri,
            PhaseData::RequestHeaders(_) => phase == Phase::RequestHeaders,
            PhaseData::RequestBody(_) => phase == Phase::RequestBody,
            PhaseData::ResponseHeaders { .. } => phase == Phase::ResponseHeaders,
            PhaseData::ResponseBody(_) => phase == Phase::ResponseBody,
        }
    }
}

fn collect_pairs<I, K, V>(pairs: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Inspected request/response facets of one transaction.
///
/// The store only grows: values are appended within a phase and later phases
/// extend it. Every append bumps [`revision`](Self::revision).
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<Variable, OrderedCollection>,
    request_body: Vec<u8>,
    response_body: Vec<u8>,
    revision: u64,
}

impl VariableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of appends so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Append a keyed value to a collection variable.
    pub fn append(&mut self, variable: Variable, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(variable).or_default().add(key, value);
        self.revision += 1;
    }

    /// Append a value to a scalar variable.
    pub fn append_value(&mut self, variable: Variable, value: impl Into<String>) {
        self.append(variable, variable.name(), value);
    }

    /// Append a request body chunk.
    pub fn append_request_body(&mut self, chunk: &[u8]) {
        if !chunk.is_empty() {
            self.request_body.extend_from_slice(chunk);
            self.revision += 1;
        }
    }

    /// Append a response body chunk.
    pub fn append_response_body(&mut self, chunk: &[u8]) {
        if !chunk.is_empty() {
            self.response_body.extend_from_slice(chunk);
            self.revision += 1;
        }
    }

    /// Stored entries of a variable.
    pub fn collection(&self, variable: Variable) -> Option<&OrderedCollection> {
        self.values.get(&variable)
    }

    /// All stored values of a variable.
    pub fn values(&self, variable: Variable) -> Vec<&str> {
        self.values
            .get(&variable)
            .map(|c| c.all().into_iter().map(|(_, v)| v).collect())
            .unwrap_or_default()
    }

    /// First stored value of a variable.
    pub fn first(&self, variable: Variable) -> Option<&str> {
        self.values(variable).into_iter().next()
    }

    /// Accumulated request body.
    pub fn request_body(&self) -> &[u8] {
        &self.request_body
    }

    /// Accumulated response body.
    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    /// Whether the request declared a form-encoded body.
    pub fn is_form_body(&self) -> bool {
        self.values
            .get(&Variable::RequestHeaders)
            .map(|h| {
                h.get("content-type").iter().any(|ct| {
                    ct.to_ascii_lowercase()
                        .starts_with("application/x-www-form-urlencoded")
                })
            })
            .unwrap_or(false)
    }

    /// Arguments parsed from a form-encoded request body.
    pub fn form_args(&self) -> OrderedCollection {
        let mut args = OrderedCollection::new();
        if self.is_form_body() {
            parse_query(&String::from_utf8_lossy(&self.request_body), &mut args);
        }
        args
    }

    /// Merge a phase data bundle into the store.
    pub fn merge(&mut self, phase: Phase, data: PhaseData) -> Result<()> {
        if !data.belongs_to(phase) {
            return Err(Error::PhaseDataMismatch {
                phase,
                data: data.kind(),
            });
        }

        match data {
            PhaseData::Empty => {}
            PhaseData::Connection {
                client_ip,
                client_port,
                server_ip,
                server_port,
            } => {
                self.append_value(Variable::RemoteAddr, client_ip);
                self.append_value(Variable::RemotePort, client_port.to_string());
                self.append_value(Variable::ServerAddr, server_ip);
                self.append_value(Variable::ServerPort, server_port.to_string());
            }
            PhaseData::Uri {
                uri,
                method,
                protocol,
            } => self.merge_uri(&uri, &method, &protocol),
            PhaseData::RequestHeaders(headers) => {
                for (name, value) in headers {
                    if name.eq_ignore_ascii_case("cookie") {
                        self.merge_cookies(&value);
                    }
                    self.append(Variable::RequestHeaders, name.to_ascii_lowercase(), value);
                }
            }
            PhaseData::RequestBody(chunk) => self.append_request_body(&chunk),
            PhaseData::ResponseHeaders {
                status,
                protocol,
                headers,
            } => {
                self.append_value(Variable::ResponseStatus, status.to_string());
                self.append_value(Variable::ResponseProtocol, protocol);
                for (name, value) in headers {
                    if name.eq_ignore_ascii_case("content-type") {
                        self.append_value(Variable::ResponseContentType, value.clone());
                    }
                    self.append(Variable::ResponseHeaders, name.to_ascii_lowercase(), value);
                }
            }
            PhaseData::ResponseBody(chunk) => self.append_response_body(&chunk),
        }

        Ok(())
    }

    fn merge_uri(&mut self, uri: &str, method: &str, protocol: &str) {
        self.append_value(Variable::RequestUri, uri);
        self.append_value(Variable::RequestMethod, method);
        self.append_value(Variable::RequestProtocol, protocol);
        self.append_value(
            Variable::RequestLine,
            format!("{} {} {}", method, uri, protocol),
        );

        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        self.append_value(Variable::RequestFilename, path);
        self.append_value(Variable::QueryString, query);

        let mut args = OrderedCollection::new();
        parse_query(query, &mut args);
        for (key, value) in args.all() {
            self.append(Variable::ArgsGet, key, value);
        }
    }

    fn merge_cookies(&mut self, header: &str) {
        for pair in header.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((name, value)) => {
                    self.append(Variable::RequestCookies, name.trim(), value.trim())
                }
                None => self.append(Variable::RequestCookies, pair, ""),
            }
        }
    }
}

/// Parse an `a=1&b=2` string into a collection, URL-decoding keys and values.
fn parse_query(qs: &str, out: &mut OrderedCollection) {
    for pair in qs.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.add(url_decode(key), url_decode(value));
    }
}

fn url_decode(s: &str) -> String {
    let spaced = s.replace('+', " ");
    percent_encoding::percent_decode_str(&spaced)
        .decode_utf8_lossy()
        .into_owned()
}
