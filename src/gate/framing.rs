//! Framing validation.
//!
//! Checks the declared metadata of the HTTP message (method, content type,
//! charset, length) against what was actually received, before any of the
//! body is interpreted.

use std::collections::HashMap;

use axum::http::{header, HeaderMap, Method};

use crate::gate::denial::Denial;

const ALLOWED_CONTENT_TYPE: &str = "application/json";

/// Only POST and PUT carry an event. OPTIONS is answered before this runs.
pub fn check_method(method: &Method) -> Result<(), Denial> {
    if method == Method::POST || method == Method::PUT {
        Ok(())
    } else {
        Err(Denial::MethodNotAllowed(method.to_string()))
    }
}

/// Run every framing check in order.
pub fn check_framing(headers: &HeaderMap, body: &[u8], post_body_limit: usize) -> Result<(), Denial> {
    check_content_type(headers)?;
    check_content_length(headers, body.len())?;
    check_body_limit(body.len(), post_body_limit)
}

/// A missing Content-Type is accepted; JSON decoding catches bad bodies later.
pub fn check_content_type(headers: &HeaderMap) -> Result<(), Denial> {
    let elements: Vec<String> = match headers.get(header::CONTENT_TYPE) {
        Some(value) => String::from_utf8_lossy(value.as_bytes())
            .split(';')
            .map(|element| element.trim().to_lowercase())
            .collect(),
        None => Vec::new(),
    };

    if let Some(primary) = elements.first() {
        if primary != ALLOWED_CONTENT_TYPE {
            return Err(Denial::BadContentType(primary.clone()));
        }
    }

    let mut parameters: HashMap<&str, &str> = HashMap::new();
    if elements.len() > 1 {
        for element in &elements {
            if !element.contains('=') {
                continue;
            }
            let mut parts = element.split('=');
            let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(Denial::MangledContentType);
            };
            if parameters.insert(name.trim(), value.trim()).is_some() {
                return Err(Denial::MangledContentType);
            }
        }
    }

    let charset = parameters.get("charset").copied().unwrap_or("utf-8");
    if charset != "utf-8" && charset != "utf8" {
        return Err(Denial::BadCharset(charset.to_string()));
    }
    Ok(())
}

/// Body length must match the declared Content-Length, if any.
pub fn check_content_length(headers: &HeaderMap, body_length: usize) -> Result<(), Denial> {
    let mut declared = headers.get_all(header::CONTENT_LENGTH).iter();
    let Some(value) = declared.next() else {
        return Ok(());
    };
    if declared.next().is_some() {
        return Err(Denial::MultipleContentLength);
    }

    let raw = String::from_utf8_lossy(value.as_bytes());
    let declared: u64 = raw
        .trim()
        .parse()
        .map_err(|_| Denial::InvalidContentLength(raw.to_string()))?;

    if declared != body_length as u64 {
        return Err(Denial::LengthMismatch {
            body: body_length,
            declared,
        });
    }
    Ok(())
}

/// Zero means unlimited.
pub fn check_body_limit(body_length: usize, post_body_limit: usize) -> Result<(), Denial> {
    if post_body_limit > 0 && body_length > post_body_limit {
        return Err(Denial::BodyTooLarge {
            length: body_length,
            limit: post_body_limit,
        });
    }
    Ok(())
}
