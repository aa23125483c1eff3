//! Denial taxonomy.
//!
//! Every way the gate can refuse a request is a [`Denial`] variant. Each
//! variant maps to exactly one [`DenialKind`], one HTTP status and one log
//! category (`AR<code>`), so responses and log lines stay stable across
//! releases.

use axum::http::StatusCode;

/// Coarse classification of a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialKind {
    MethodNotAllowed,
    BadContentType,
    BadFraming,
    BodyTooLarge,
    MissingSignedField,
    InvalidTimestamp,
    InvalidSeqOrNonce,
    UnknownKey,
    InvalidSignature,
    PolicyDenied,
    NotAuthorized,
    InvalidEncoding,
    InvalidJson,
    InternalError,
}

impl DenialKind {
    /// HTTP status code returned to the client.
    pub fn status(self) -> StatusCode {
        match self {
            DenialKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DenialKind::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            DenialKind::UnknownKey | DenialKind::InvalidSignature | DenialKind::NotAuthorized => {
                StatusCode::UNAUTHORIZED
            }
            DenialKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            DenialKind::BadContentType
            | DenialKind::BadFraming
            | DenialKind::MissingSignedField
            | DenialKind::InvalidTimestamp
            | DenialKind::InvalidSeqOrNonce
            | DenialKind::PolicyDenied
            | DenialKind::InvalidEncoding
            | DenialKind::InvalidJson => StatusCode::BAD_REQUEST,
        }
    }
}

/// A request refused by the gate, with the message sent back to the client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Denial {
    #[error("HTTP/{0} not allowed (only HTTP/POST or HTTP/PUT)")]
    MethodNotAllowed(String),

    #[error("bad content type: if a content type is present, it MUST be 'application/json', not '{0}'")]
    BadContentType(String),

    #[error("mangled Content-Type header")]
    MangledContentType,

    #[error("'{0}' is not an accepted charset encoding, must be utf-8")]
    BadCharset(String),

    #[error("Multiple Content-Length headers are not allowed")]
    MultipleContentLength,

    #[error("invalid Content-Length header '{0}'")]
    InvalidContentLength(String),

    #[error("HTTP/POST|PUT body length ({body}) is different to Content-Length ({declared})")]
    LengthMismatch { body: usize, declared: u64 },

    #[error("HTTP/POST|PUT body length ({length}) exceeds maximum ({limit})")]
    BodyTooLarge { length: usize, limit: usize },

    #[error("HTTP/POST|PUT body exceeds maximum readable size ({limit})")]
    BodyUnreadable { limit: usize },

    #[error("signed request required, but mandatory '{0}' field missing")]
    MissingSignedField(&'static str),

    #[error("invalid timestamp '{0}' (must be UTC/ISO-8601, e.g. '2011-10-14T16:59:51.123456Z')")]
    InvalidTimestamp(String),

    #[error("request expired (delta {0} seconds)")]
    RequestExpired(f64),

    #[error("invalid sequence number '{0}' (must be an integer)")]
    InvalidSeq(String),

    #[error("invalid nonce '{0}' (must be an integer)")]
    InvalidNonce(String),

    #[error("unknown key '{0}' in signed request")]
    UnknownKey(String),

    #[error("invalid request signature")]
    InvalidSignature,

    #[error("request denied based on IP address")]
    IpDenied,

    #[error("request denied because not using TLS")]
    TlsRequired,

    #[error("not authorized")]
    NotAuthorized,

    #[error("invalid request event - HTTP/POST|PUT body was invalid UTF-8")]
    InvalidUtf8,

    #[error("invalid request event - HTTP/POST|PUT body must be valid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid request event - HTTP/POST|PUT body must be a JSON dict")]
    NotAnObject,

    #[error("Unhandled server error.")]
    Internal,
}

impl Denial {
    pub fn kind(&self) -> DenialKind {
        match self {
            Denial::MethodNotAllowed(_) => DenialKind::MethodNotAllowed,
            Denial::BadContentType(_) | Denial::MangledContentType | Denial::BadCharset(_) => {
                DenialKind::BadContentType
            }
            Denial::MultipleContentLength
            | Denial::InvalidContentLength(_)
            | Denial::LengthMismatch { .. } => DenialKind::BadFraming,
            Denial::BodyTooLarge { .. } | Denial::BodyUnreadable { .. } => DenialKind::BodyTooLarge,
            Denial::MissingSignedField(_) => DenialKind::MissingSignedField,
            Denial::InvalidTimestamp(_) | Denial::RequestExpired(_) => DenialKind::InvalidTimestamp,
            Denial::InvalidSeq(_) | Denial::InvalidNonce(_) => DenialKind::InvalidSeqOrNonce,
            Denial::UnknownKey(_) => DenialKind::UnknownKey,
            Denial::InvalidSignature => DenialKind::InvalidSignature,
            Denial::IpDenied | Denial::TlsRequired => DenialKind::PolicyDenied,
            Denial::NotAuthorized => DenialKind::NotAuthorized,
            Denial::InvalidUtf8 => DenialKind::InvalidEncoding,
            Denial::InvalidJson(_) | Denial::NotAnObject => DenialKind::InvalidJson,
            Denial::Internal => DenialKind::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    /// Log category attached to the denial's log line.
    ///
    /// Specific checks carry their own category; everything else falls back
    /// to `AR` followed by the status code.
    pub fn log_category(&self) -> &'static str {
        match self {
            Denial::BadContentType(_) => "AR452",
            Denial::MangledContentType | Denial::BadCharset(_) => "AR450",
            Denial::MissingSignedField(_) => "AR461",
            Denial::InvalidTimestamp(_)
            | Denial::RequestExpired(_)
            | Denial::InvalidSeq(_)
            | Denial::InvalidNonce(_) => "AR462",
            Denial::UnknownKey(_) => "AR460",
            Denial::InvalidSignature => "AR459",
            Denial::InvalidUtf8 => "AR451",
            Denial::InvalidJson(_) => "AR453",
            Denial::NotAnObject => "AR454",
            _ => match self.status() {
                StatusCode::METHOD_NOT_ALLOWED => "AR405",
                StatusCode::PAYLOAD_TOO_LARGE => "AR413",
                StatusCode::UNAUTHORIZED => "AR401",
                StatusCode::INTERNAL_SERVER_ERROR => "AR500",
                _ => "AR400",
            },
        }
    }

    /// Response body: the message on a single newline-terminated line.
    pub fn body(&self) -> String {
        format!("{self}\n")
    }
}
