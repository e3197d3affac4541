//! Transport-agnostic dispatch.
//!
//! HTTP handlers and pub/sub routes both collect a [`Params`] map, parse it into
//! an operation's parameter struct and run the operation through one of the
//! authorization wrappers: [`signed`], [`authorized`] or [`regular`].

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use orvd_core::models::{KeyGroup, NOT_FOUND, OK};
use orvd_core::topic::TopicParams;
use std::collections::HashMap;
use std::future::Future;

use crate::error::ApiError;
use crate::persistence::users;
use crate::state::AppState;

/// Flat string parameters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a `k=v&...` string. The first occurrence of a key wins.
    pub fn from_query(raw: &str) -> Self {
        let mut params = Self::new();
        params.extend_urlencoded(raw);
        params
    }

    pub fn extend_urlencoded(&mut self, raw: &str) {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            self.0
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }

    /// Top-level fields of a JSON object. Strings stay as-is, other scalars are rendered.
    pub fn extend_json(&mut self, value: &serde_json::Value) {
        let Some(object) = value.as_object() else {
            return;
        };
        for (key, value) in object {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            self.0.entry(key.clone()).or_insert(rendered);
        }
    }

    /// Bind values captured from a topic. Topic segments override body fields.
    pub fn extend_topic(&mut self, topic: &TopicParams) {
        for (name, value) in &topic.named {
            self.0.insert(name.clone(), value.clone());
        }
        for (i, value) in topic.wildcards.iter().enumerate() {
            self.0.insert(format!("wildcard_{}", i), value.clone());
        }
        if let Some(rest) = &topic.hash_path {
            self.0.insert("hash_path".to_string(), rest.clone());
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// A present, non-empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str, message: &str) -> Result<String, ApiError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request(message))
    }

    pub fn require_int(&self, key: &str, message: &str) -> Result<i64, ApiError> {
        self.get(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| ApiError::bad_request(message))
    }
}

/// Operation parameters filled from a [`Params`] map. Fails with `BadRequest`.
pub trait FromParams: Sized {
    fn from_params(params: &Params) -> Result<Self, ApiError>;
}

/// Operations without parameters.
#[derive(Debug, Clone, Copy)]
pub struct NoParams;

impl FromParams for NoParams {
    fn from_params(_: &Params) -> Result<Self, ApiError> {
        Ok(Self)
    }
}

/// Just a vehicle id.
#[derive(Debug, Clone)]
pub struct IdParams {
    pub id: String,
}

impl FromParams for IdParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        Ok(Self {
            id: params.require("id", "Wrong id")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DecisionParams {
    pub id: String,
    pub decision: i64,
}

impl FromParams for DecisionParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        const MSG: &str = "Wrong id/decision";
        Ok(Self {
            id: params.require("id", MSG)?,
            decision: params.require_int("decision", MSG)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DelayParams {
    pub id: String,
    pub delay: i64,
}

impl FromParams for DelayParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        const MSG: &str = "Wrong id/delay";
        let id = params.require("id", MSG)?;
        let delay = params.require_int("delay", MSG)?;
        if delay <= 0 {
            return Err(ApiError::bad_request(MSG));
        }
        Ok(Self { id, delay })
    }
}

#[derive(Debug, Clone)]
pub struct NameParams {
    pub name: String,
}

impl FromParams for NameParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        Ok(Self {
            name: params.require("name", "Wrong name")?,
        })
    }
}

/// Vehicle key submission.
#[derive(Debug, Clone)]
pub struct KeyParams {
    pub id: String,
    pub n: String,
    pub e: String,
}

impl FromParams for KeyParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        const MSG: &str = "Wrong id";
        Ok(Self {
            id: params.require("id", MSG)?,
            n: params.require("n", MSG)?,
            e: params.require("e", MSG)?,
        })
    }
}

/// Raw telemetry fields; absent fields are stored as null.
#[derive(Debug, Clone)]
pub struct TelemetryParams {
    pub id: String,
    pub report: orvd_core::models::TelemetryReport,
}

impl FromParams for TelemetryParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        let field = |name: &str| params.get(name).map(str::to_string);
        Ok(Self {
            id: params.require("id", "Wrong id")?,
            report: orvd_core::models::TelemetryReport {
                lat: field("lat"),
                lon: field("lon"),
                alt: field("alt"),
                azimuth: field("azimuth"),
                dop: field("dop"),
                sats: field("sats"),
                speed: field("speed"),
            },
        })
    }
}

/// Revised mission submitted by a vehicle.
#[derive(Debug, Clone)]
pub struct ReviseParams {
    pub id: String,
    pub mission: String,
}

impl FromParams for ReviseParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        const MSG: &str = "Wrong id/mission";
        Ok(Self {
            id: params.require("id", MSG)?,
            mission: params.require("mission", MSG)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogParams {
    pub id: String,
    pub log: String,
}

impl FromParams for LogParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        const MSG: &str = "Wrong id/log";
        Ok(Self {
            id: params.require("id", MSG)?,
            log: params.require("log", MSG)?,
        })
    }
}

/// WPL upload, from the HTTP body or the `mission_str` field of a pub/sub message.
#[derive(Debug, Clone)]
pub struct MissionUploadParams {
    pub id: String,
    pub mission: String,
}

impl FromParams for MissionUploadParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        const MSG: &str = "Wrong id";
        Ok(Self {
            id: params.require("id", MSG)?,
            mission: params.require("mission_str", "Wrong mission")?,
        })
    }
}

/// Operator credentials. Missing values behave like an unknown user.
#[derive(Debug, Clone)]
pub struct LoginParams {
    pub login: String,
    pub password: String,
}

impl FromParams for LoginParams {
    fn from_params(params: &Params) -> Result<Self, ApiError> {
        Ok(Self {
            login: params.get("login").unwrap_or_default().to_string(),
            password: params.get("password").unwrap_or_default().to_string(),
        })
    }
}

/// Operation result before transport encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Json(serde_json::Value),
    Attachment { filename: String, content: String },
}

impl Answer {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn not_found() -> Self {
        Self::Text(NOT_FOUND.to_string())
    }

    pub fn ok() -> Self {
        Self::Text(OK.to_string())
    }

    /// The body as it would travel over a text transport.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::Attachment { content, .. } => content.clone(),
        }
    }
}

/// Status plus answer, ready for either transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub answer: Answer,
}

impl Reply {
    pub fn ok(answer: Answer) -> Self {
        Self {
            status: StatusCode::OK,
            answer,
        }
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            answer: Answer::text(text),
        }
    }

    /// Unsigned error reply. Internal errors are logged here.
    pub fn from_error(err: ApiError) -> Self {
        if let ApiError::Internal(e) = &err {
            tracing::error!("Operation failed: {:#}", e);
        }
        Self::text(err.status(), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> String {
        self.answer.to_text()
    }
}

impl From<ApiError> for Reply {
    fn from(err: ApiError) -> Self {
        Self::from_error(err)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.answer {
            Answer::Text(text) => (self.status, text).into_response(),
            Answer::Json(value) => (self.status, Json(value)).into_response(),
            Answer::Attachment { filename, content } => (
                self.status,
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                content,
            )
                .into_response(),
        }
    }
}

/// Parse operation parameters or produce the 400 reply.
pub fn parse<P: FromParams>(params: &Params) -> Result<P, Reply> {
    P::from_params(params).map_err(Reply::from_error)
}

/// Verify `sig` over `canonical` for `group`, run `op`, sign whatever comes back.
///
/// A failed check answers a signed `$Signature verification fail` with 403.
pub async fn signed<F, Fut>(
    state: &AppState,
    group: KeyGroup,
    canonical: &str,
    sig: Option<&str>,
    op: F,
) -> Reply
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    let verified = match sig {
        Some(sig) => state.keys.verify(canonical, sig, &group).await,
        None => false,
    };
    if !verified {
        tracing::warn!("Failed to verify {} for {}", canonical, group);
        return signature_rejected(state);
    }
    match op().await {
        Ok(answer) => Reply::ok(Answer::Text(state.keys.sign_reply(&answer.to_text()))),
        Err(err) => Reply::from_error(err),
    }
}

fn signature_rejected(state: &AppState) -> Reply {
    let body = ApiError::SignatureInvalid.to_string();
    Reply::text(StatusCode::FORBIDDEN, state.keys.sign_reply(&body))
}

/// Like [`signed`] but accepts any signature that is present. Mission senders upload through here.
pub async fn signed_unverified<F, Fut>(state: &AppState, sig: Option<&str>, op: F) -> Reply
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    if sig.is_none() {
        tracing::warn!("Unsigned mission sender request");
        return signature_rejected(state);
    }
    match op().await {
        Ok(answer) => Reply::ok(Answer::Text(state.keys.sign_reply(&answer.to_text()))),
        Err(err) => Reply::from_error(err),
    }
}

/// Check an operator token before running `op`.
pub async fn authorized<F, Fut>(state: &AppState, token: Option<&str>, op: F) -> Reply
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    match check_token(state, token).await {
        Ok(true) => {}
        Ok(false) => return Reply::from_error(ApiError::Unauthorized),
        Err(err) => return Reply::from_error(err),
    }
    match op().await {
        Ok(answer) => Reply::ok(answer),
        Err(err) => Reply::from_error(err),
    }
}

pub async fn check_token(state: &AppState, token: Option<&str>) -> Result<bool, ApiError> {
    match token.filter(|t| !t.is_empty()) {
        Some(token) => Ok(users::token_exists(state.db.pool(), token).await?),
        None => Ok(false),
    }
}

/// Unauthenticated path: every failure collapses to 409 `Conflict.`.
pub async fn regular<F, Fut>(op: F) -> Reply
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Answer, ApiError>>,
{
    match op().await {
        Ok(answer) => Reply::ok(answer),
        Err(err) => {
            tracing::warn!("Request failed: {:?}", err);
            Reply::from_error(ApiError::Conflict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orvd_core::topic::TopicPattern;

    #[test]
    fn query_and_topic_merge() {
        let mut params = Params::from_query("id=V1&lat=1&lat=2&sig=0xab&empty=");
        assert_eq!(params.get("lat"), Some("1"));
        assert_eq!(params.get("empty"), None);

        let pattern = TopicPattern::compile("api/arm/request/{id}").unwrap();
        let bound = pattern.matches("api/arm/request/V2").unwrap();
        params.extend_topic(&bound);
        assert_eq!(params.get("id"), Some("V2"));
    }

    #[test]
    fn json_fields_become_params() {
        let mut params = Params::new();
        params.extend_json(&serde_json::json!({"mission_str": "QGC WPL 110", "n": 3, "x": null}));
        assert_eq!(params.get("mission_str"), Some("QGC WPL 110"));
        assert_eq!(params.get("n"), Some("3"));
        assert_eq!(params.get("x"), None);
    }

    #[test]
    fn parameter_structs_fail_fast() {
        let params = Params::from_query("id=V1&decision=x");
        let err = DecisionParams::from_params(&params).unwrap_err();
        assert_eq!(err.to_string(), "Wrong id/decision");

        let params = Params::from_query("id=V1&delay=0");
        assert!(DelayParams::from_params(&params).is_err());
        let params = Params::from_query("id=V1&delay=5");
        assert_eq!(DelayParams::from_params(&params).unwrap().delay, 5);

        let reply = parse::<IdParams>(&Params::new()).unwrap_err();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body(), "Wrong id");
    }

    #[tokio::test]
    async fn regular_collapses_errors() {
        let reply = regular(|| async { Err(ApiError::from(anyhow::anyhow!("boom"))) }).await;
        assert_eq!(reply.status, StatusCode::CONFLICT);
        assert_eq!(reply.body(), "Conflict.");

        let reply = regular(|| async { Ok(Answer::ok()) }).await;
        assert_eq!(reply, Reply::ok(Answer::text("$OK")));
    }
}
