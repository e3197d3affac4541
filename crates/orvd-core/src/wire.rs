//! Tagged text protocol: `$Tag value$Tag2 value2#<hex signature>`.

use crate::crypto::{self, BigUint, KeyPair};

/// Builds a reply from ordered `(tag, value)` segments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageBuilder {
    body: String,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment(mut self, tag: &str, value: impl std::fmt::Display) -> Self {
        self.body.push('$');
        self.body.push_str(tag);
        self.body.push(' ');
        self.body.push_str(&value.to_string());
        self
    }

    /// Append already-formatted text, e.g. a nested `$Tag value` chunk.
    pub fn raw(mut self, text: &str) -> Self {
        self.body.push_str(text);
        self
    }

    pub fn build(self) -> String {
        self.body
    }
}

/// One parsed `$Tag value` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub tag: String,
    pub value: String,
}

/// A received protocol message with its optional trailing signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: String,
    pub signature: Option<String>,
}

impl Message {
    pub fn parse(text: &str) -> Self {
        let (body, signature) = split_signature(text);
        Self {
            body: body.to_string(),
            signature: signature.map(str::to_string),
        }
    }

    pub fn segments(&self) -> Vec<Segment> {
        parse_segments(&self.body)
    }

    /// Value of the first segment with `tag`.
    pub fn get(&self, tag: &str) -> Option<String> {
        self.segments()
            .into_iter()
            .find(|s| s.tag == tag)
            .map(|s| s.value)
    }

    /// Verify the trailing signature against `key`.
    pub fn verify(&self, key: &crypto::PublicKey) -> bool {
        match self.signature.as_deref().map(crypto::parse_hex) {
            Some(Ok(sig)) => key.verify(&self.body, &sig),
            _ => false,
        }
    }
}

/// Split `body#sig`. The signature is the text after the last `#`.
pub fn split_signature(text: &str) -> (&str, Option<&str>) {
    match text.rfind('#') {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    }
}

/// Split a body into its `$Tag value` segments.
pub fn parse_segments(body: &str) -> Vec<Segment> {
    body.split('$')
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| match chunk.split_once(' ') {
            Some((tag, value)) => Segment {
                tag: tag.to_string(),
                value: value.to_string(),
            },
            None => Segment {
                tag: chunk.to_string(),
                value: String::new(),
            },
        })
        .collect()
}

/// Append the server signature to `body`.
pub fn sign_message(body: &str, key: &KeyPair) -> String {
    format!("{}#{}", body, key.sign_hex(body))
}

pub fn attach_signature(body: &str, signature: &BigUint) -> String {
    format!("{}#{}", body, crypto::to_hex(signature))
}

/// The string a client signs for a request: path plus the query with `sig` removed.
///
/// Pairs keep their original order and encoding.
pub fn canonical_request(path: &str, raw_query: &str) -> String {
    let query = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("sig"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}
