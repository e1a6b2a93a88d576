// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Gremlin Server request/response envelopes (GraphSON v2 serializer).
//!
//! Binary frame layout:
//!
//! ``MIME_LEN(1) || MIME || JSON(RequestMessage)``
//!
//! Responses arrive as JSON text (or binary without the mime prefix). A
//! request may be answered by several `206` partial batches before its final
//! `200`/`204`.

use crate::status::{ServiceError, StatusCategory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Mime type announced in every binary request frame.
pub const MIME_TYPE: &str = "application/vnd.gremlin-v2.0+json";

/// Attribute carrying the document-store status code behind a generic 5xx.
pub const SUB_STATUS_ATTRIBUTE: &str = "x-ms-status-code";
/// Attribute carrying the service's retry hint.
pub const RETRY_AFTER_ATTRIBUTE: &str = "x-ms-retry-after-ms";

/// Arguments of a request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestArgs {
    /// `op: "eval"`: evaluate a script.
    Eval {
        /// Script text.
        gremlin: String,
        /// Script bindings.
        bindings: BTreeMap<String, Json>,
        /// Script language (`gremlin-groovy`).
        language: String,
    },
    /// `op: "authentication"`: answer a 407 challenge.
    Authentication {
        /// Base64 SASL payload.
        sasl: String,
        /// SASL mechanism.
        #[serde(rename = "saslMechanism")]
        sasl_mechanism: String,
    },
}

/// A request sent to Gremlin Server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    /// Correlates responses with this request.
    pub request_id: Uuid,
    /// Operation name.
    pub op: String,
    /// Op processor; empty selects the default session-less processor.
    pub processor: String,
    /// Operation arguments.
    pub args: RequestArgs,
}

impl RequestMessage {
    /// Build an `eval` request.
    pub fn eval(request_id: Uuid, gremlin: impl Into<String>) -> Self {
        Self {
            request_id,
            op: "eval".into(),
            processor: String::new(),
            args: RequestArgs::Eval {
                gremlin: gremlin.into(),
                bindings: BTreeMap::new(),
                language: "gremlin-groovy".into(),
            },
        }
    }

    /// Build an `authentication` reply carrying a base64 SASL PLAIN payload.
    pub fn authentication(request_id: Uuid, sasl_base64: impl Into<String>) -> Self {
        Self {
            request_id,
            op: "authentication".into(),
            processor: String::new(),
            args: RequestArgs::Authentication {
                sasl: sasl_base64.into(),
                sasl_mechanism: "PLAIN".into(),
            },
        }
    }

    /// Encode as a binary frame (mime prefix + JSON body).
    pub fn to_binary(&self) -> Result<Vec<u8>, serde_json::Error> {
        let body = serde_json::to_vec(self)?;
        let mime = MIME_TYPE.as_bytes();
        let mut out = Vec::with_capacity(1 + mime.len() + body.len());
        #[allow(clippy::cast_possible_truncation)]
        out.push(mime.len() as u8);
        out.extend_from_slice(mime);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// `status` block of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseStatus {
    /// Gremlin Server status code.
    pub code: u16,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Server attributes (document-store status code, retry hint, charges).
    #[serde(default)]
    pub attributes: Map<String, Json>,
}

/// `result` block of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseResult {
    /// One batch of records (plain JSON array or `g:List`).
    #[serde(default)]
    pub data: Json,
    /// Result metadata.
    #[serde(default)]
    pub meta: Map<String, Json>,
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    /// Request this frame answers.
    pub request_id: Option<Uuid>,
    /// Status block.
    pub status: ResponseStatus,
    /// Result block.
    #[serde(default)]
    pub result: ResponseResult,
}

impl ResponseMessage {
    /// Decode a response frame; a leading mime prefix is skipped if present.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let body = match bytes.first() {
            Some(&len) if bytes.get(1..=usize::from(len)) == Some(MIME_TYPE.as_bytes()) => {
                &bytes[1 + usize::from(len)..]
            }
            _ => bytes,
        };
        serde_json::from_slice(body)
    }

    /// The records in this frame's batch.
    pub fn records(&self) -> Vec<&Json> {
        match &self.result.data {
            Json::Null => Vec::new(),
            Json::Array(items) => items.iter().collect(),
            Json::Object(obj) => match (obj.get("@type"), obj.get("@value")) {
                (Some(Json::String(ty)), Some(Json::Array(items))) if ty == "g:List" => {
                    items.iter().collect()
                }
                _ => vec![&self.result.data],
            },
            other => vec![other],
        }
    }
}

/// What a response frame means for its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// `200`: final batch.
    Success,
    /// `204`: finished with no data.
    NoContent,
    /// `206`: more batches follow.
    Partial,
    /// `407`: the server wants SASL credentials.
    Authenticate,
    /// Any failure.
    Failure(ServiceError),
}

impl ResponseStatus {
    /// Classify this status.
    pub fn kind(&self) -> ResponseKind {
        match self.code {
            200 => ResponseKind::Success,
            204 => ResponseKind::NoContent,
            206 => ResponseKind::Partial,
            407 => ResponseKind::Authenticate,
            _ => ResponseKind::Failure(
                ServiceError::new(self.category(), self.message.clone())
                    .with_retry_after(self.retry_after()),
            ),
        }
    }

    fn sub_status(&self) -> Option<u64> {
        match self.attributes.get(SUB_STATUS_ATTRIBUTE)? {
            Json::Number(n) => n.as_u64(),
            Json::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Map a failure code to its category.
    pub fn category(&self) -> StatusCategory {
        match (self.code, self.sub_status()) {
            (401, _) => StatusCategory::Unauthorized,
            (498 | 499, _) => StatusCategory::BadRequest,
            (408 | 598, _) | (597 | 500, Some(408)) => StatusCategory::Timeout,
            (597 | 500, Some(429)) => StatusCategory::Throttled,
            (597 | 500, Some(404)) => StatusCategory::NotFound,
            (597 | 500, Some(409 | 412)) => StatusCategory::Conflict,
            (597 | 500, Some(400)) => StatusCategory::BadRequest,
            (597 | 500, Some(401 | 403)) => StatusCategory::Unauthorized,
            _ => StatusCategory::Internal,
        }
    }

    /// Retry hint from the status attributes.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.attributes.get(RETRY_AFTER_ATTRIBUTE)? {
            Json::Number(n) => n.as_u64().map(Duration::from_millis),
            Json::String(s) => parse_retry_after(s),
            _ => None,
        }
    }
}

/// Parse a retry hint given either as milliseconds (`"1500"`) or as a
/// `hh:mm:ss.fffffff` time span.
pub fn parse_retry_after(text: &str) -> Option<Duration> {
    let text = text.trim();
    if let Ok(ms) = text.parse::<u64>() {
        return Some(Duration::from_millis(ms));
    }
    let mut parts = text.split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let hours: u64 = h.parse().ok()?;
    let minutes: u64 = m.parse().ok()?;
    let (secs, frac) = s.split_once('.').unwrap_or((s, ""));
    let secs: u64 = secs.parse().ok()?;
    // fraction is in 100ns ticks; keep nanosecond precision
    let mut nanos = 0u32;
    let mut scale = 100_000_000u32;
    for digit in frac.chars().take(9) {
        nanos += digit.to_digit(10)? * scale;
        scale /= 10;
    }
    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(secs)?;
    Some(Duration::new(total, nanos))
}
