//! Webhook envelope types.
//!
//! An inbound webhook is a raw body plus a header collection. The core never
//! mutates or persists either; headers are normalized to lowercase names once
//! at construction so lookups behave identically whether the source was a
//! key/value mapping, a list of pairs, or a framework header map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Case-insensitive webhook header collection.
///
/// Header names are lowercased at insertion; lookups lowercase the query.
/// Duplicate names keep the first value seen, matching what HTTP frameworks
/// expose for signature headers.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    entries: HashMap<String, String>,
}

impl WebhookHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any sequence of name/value pairs (a `HashMap`, a `Vec` of
    /// tuples, or an iterator over either).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = HashMap::new();
        for (name, value) in pairs {
            entries
                .entry(name.as_ref().to_ascii_lowercase())
                .or_insert_with(|| value.as_ref().to_string());
        }
        Self { entries }
    }

    /// Look up a header by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl From<&http::HeaderMap> for WebhookHeaders {
    fn from(map: &http::HeaderMap) -> Self {
        Self::from_pairs(
            map.iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        )
    }
}

/// Inbound webhook request envelope.
///
/// Owned entirely by the caller; the pipeline reads the body bytes exactly as
/// delivered (signatures are computed over the raw bytes, so any re-encoding
/// would break verification).
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub body: Vec<u8>,
    pub headers: WebhookHeaders,
}

impl WebhookRequest {
    pub fn new(body: impl Into<Vec<u8>>, headers: WebhookHeaders) -> Self {
        Self {
            body: body.into(),
            headers,
        }
    }
}

/// Acknowledgment returned to the webhook caller.
///
/// `200` covers both "verified and dispatched" and "verification skipped
/// because no secret/signature was configured"; `401` covers a failed
/// verification. Handler outcomes never influence the acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: u16,
    pub received: bool,
}

impl WebhookAck {
    pub fn accepted() -> Self {
        Self {
            status: 200,
            received: true,
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: 401,
            received: false,
        }
    }
}
