//! Per-request context handed to the gate.

use std::collections::HashMap;
use std::net::IpAddr;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use percent_encoding::percent_decode;

/// Everything the gate knows about one inbound request.
///
/// Built once by the HTTP layer and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// First value of each query parameter, percent-decoded.
    pub query: HashMap<String, Vec<u8>>,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
    pub tls: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            body: Bytes::new(),
            client_ip: None,
            tls: false,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_query(mut self, raw_query: &str) -> Self {
        self.query = parse_query(raw_query);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_client_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.client_ip = ip;
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Raw bytes of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&[u8]> {
        self.query.get(name).map(Vec::as_slice)
    }
}

/// Parse a raw query string into name → first value.
///
/// Values keep their decoded bytes as-is (no UTF-8 requirement) since the
/// signature is computed over them.
pub fn parse_query(raw: &str) -> HashMap<String, Vec<u8>> {
    let mut params = HashMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = String::from_utf8_lossy(&decode_component(name)).into_owned();
        params.entry(name).or_insert_with(|| decode_component(value));
    }
    params
}

// form_urlencoded yields lossy `str`; signatures need the exact decoded bytes.
fn decode_component(component: &str) -> Vec<u8> {
    let plus_as_space = component.replace('+', " ");
    percent_decode(plus_as_space.as_bytes()).collect()
}
