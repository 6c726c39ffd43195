pub mod http;
pub mod saas;
pub mod sdk;

use serde::Serialize;
use std::fmt;

pub use saas::SaasClient;
pub use sdk::SdkClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConnectionError,
    AuthError,
    Timeout,
    MalformedResponse,
    HttpStatus(u16),
    ImageUnreadable,
    NotEvaluated,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ConnectionError => f.write_str("connection error"),
            FailureKind::AuthError => f.write_str("authentication error"),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::MalformedResponse => f.write_str("malformed response"),
            FailureKind::HttpStatus(code) => write!(f, "HTTP {code}"),
            FailureKind::ImageUnreadable => f.write_str("image unreadable"),
            FailureKind::NotEvaluated => f.write_str("not evaluated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Diagnosis {
    Success {
        label: String,
        payload: serde_json::Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl Diagnosis {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Diagnosis::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Diagnosis::Success { .. })
    }

    pub fn cell(&self) -> String {
        match self {
            Diagnosis::Success { label, .. } => label.clone(),
            Diagnosis::Failure { message, .. } => format!("Error: {message}"),
        }
    }
}

/// A liveness backend. Implementations hold only their fixed target
/// configuration and may be called from several workers at once.
pub trait Backend: Send + Sync {
    /// Stable identifier used in logs and outcomes, e.g. `saas` or `sdk:8080`.
    fn id(&self) -> String;

    fn column(&self) -> String;

    fn evaluate(&self, image: &[u8]) -> Diagnosis;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_cell_is_prefixed() {
        let d = Diagnosis::failure(FailureKind::ConnectionError, "connection refused");
        assert_eq!(d.cell(), "Error: connection refused");
        assert!(!d.is_success());
    }

    #[test]
    fn success_cell_is_label() {
        let d = Diagnosis::Success {
            label: "LIVE".into(),
            payload: serde_json::json!({"diagnostic": "LIVE"}),
        };
        assert_eq!(d.cell(), "LIVE");
    }

    #[test]
    fn failure_serializes_with_kind() {
        let d = Diagnosis::failure(FailureKind::Timeout, "timed out after 30s");
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["status"], "failure");
        assert_eq!(v["kind"], "timeout");
    }
}
