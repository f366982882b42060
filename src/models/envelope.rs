use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Methods that never carry a request body over the wire.
    pub fn is_bodyless(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    /// Elapsed handling time in milliseconds. Absent on short-circuit paths
    /// that never reach the handler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ResponseMeta {
    pub fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            duration: None,
            endpoint: None,
            method: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub fn with_call(mut self, method: Method, endpoint: &str) -> Self {
        self.method = Some(method.as_str().to_string());
        self.endpoint = Some(endpoint.to_string());
        self
    }
}

/// The standard wrapper around every simulated API call.
///
/// Two logical copies of an envelope exist per request: the full copy
/// returned to the caller and a sanitized deep clone handed to the network
/// layer. They are never the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: ResponseMeta,
}

impl ResponseEnvelope {
    pub fn ok(status: u16, data: Option<Value>, meta: ResponseMeta) -> Self {
        Self {
            success: true,
            status,
            data,
            error: None,
            meta,
        }
    }

    pub fn fail(
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
        meta: ResponseMeta,
    ) -> Self {
        Self {
            success: false,
            status,
            data: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
            }),
            meta,
        }
    }

    /// The consumer-side safety net when no envelope arrives in time.
    pub fn gateway_timeout(request_id: &str) -> Self {
        Self::fail(
            504,
            "GATEWAY_TIMEOUT",
            "Mock handler did not respond in time",
            ResponseMeta::new(request_id),
        )
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
