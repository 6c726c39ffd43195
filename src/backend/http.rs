use super::{Diagnosis, FailureKind};
use crate::config::Timeouts;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

const ERROR_BODY_PREVIEW: usize = 200;

pub fn build_client(timeouts: &Timeouts) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeouts.request_seconds))
        .connect_timeout(Duration::from_secs(timeouts.connect_seconds))
        .build()
        .context("building HTTP client")
}

/// Sends `request` and maps the exchange onto a `Diagnosis`. A 2xx JSON body
/// carrying `result_field` is the only success path.
pub fn send_for_diagnosis(request: RequestBuilder, result_field: &str, timeouts: &Timeouts) -> Diagnosis {
    match request.send() {
        Ok(resp) => read_response(resp, result_field, timeouts),
        Err(e) => map_transport_error(&e, timeouts),
    }
}

fn read_response(resp: Response, result_field: &str, timeouts: &Timeouts) -> Diagnosis {
    let status = resp.status();
    let body = match resp.text() {
        Ok(b) => b,
        Err(e) => return map_transport_error(&e, timeouts),
    };
    debug!("backend responded status={} bytes={}", status.as_u16(), body.len());
    diagnosis_from_parts(status, &body, result_field)
}

pub(crate) fn diagnosis_from_parts(status: StatusCode, body: &str, result_field: &str) -> Diagnosis {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Diagnosis::failure(FailureKind::AuthError, status_message(status, body));
    }
    if !status.is_success() {
        return Diagnosis::failure(
            FailureKind::HttpStatus(status.as_u16()),
            status_message(status, body),
        );
    }

    let payload: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return Diagnosis::failure(
                FailureKind::MalformedResponse,
                format!("response is not JSON: {e}"),
            );
        }
    };
    let label = match payload.get(result_field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => {
            return Diagnosis::failure(
                FailureKind::MalformedResponse,
                format!("response lacks `{result_field}`"),
            );
        }
        Some(other) => other.to_string(),
    };
    Diagnosis::Success { label, payload }
}

fn status_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(ERROR_BODY_PREVIEW).collect());
    if detail.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {} - {}", status.as_u16(), detail)
    }
}

fn map_transport_error(e: &reqwest::Error, timeouts: &Timeouts) -> Diagnosis {
    if e.is_timeout() {
        return Diagnosis::failure(
            FailureKind::Timeout,
            format!("timed out after {}s", timeouts.request_seconds),
        );
    }
    if is_connection_refused(e) {
        return Diagnosis::failure(FailureKind::ConnectionError, "connection refused");
    }
    if e.is_connect() {
        let target = e.url().map(|u| u.to_string()).unwrap_or_default();
        return Diagnosis::failure(
            FailureKind::ConnectionError,
            format!("could not connect to {target}"),
        );
    }
    Diagnosis::failure(FailureKind::ConnectionError, e.to_string())
}

fn is_connection_refused(e: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = err.source();
    }
    false
}
