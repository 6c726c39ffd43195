use super::{Backend, Diagnosis, http};
use crate::config::{SdkTarget, Timeouts};
use anyhow::Result;
use base64::{Engine as _, engine::general_purpose};
use reqwest::blocking::Client;
use tracing::debug;

pub struct SdkClient {
    target: SdkTarget,
    timeouts: Timeouts,
    http: Client,
}

impl SdkClient {
    pub fn new(target: &SdkTarget, timeouts: &Timeouts) -> Result<Self> {
        Ok(Self {
            target: target.clone(),
            timeouts: *timeouts,
            http: http::build_client(timeouts)?,
        })
    }
}

impl Backend for SdkClient {
    fn id(&self) -> String {
        format!("sdk:{}", self.target.port)
    }

    fn column(&self) -> String {
        format!("Diagnostic SDK {}", self.target.version)
    }

    fn evaluate(&self, image: &[u8]) -> Diagnosis {
        debug!(
            "sdk request version={} url={} bytes={}",
            self.target.version,
            self.target.url,
            image.len()
        );
        let body = serde_json::json!({
            "image": general_purpose::STANDARD.encode(image),
        });
        let request = self.http.post(&self.target.url).json(&body);
        http::send_for_diagnosis(request, &self.target.result_field, &self.timeouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailureKind, fake_server::FakeServer};
    use std::net::TcpListener;
    use std::time::Duration;

    fn target(port: u16, url: String) -> SdkTarget {
        SdkTarget {
            port,
            version: "5.2.1".into(),
            url,
            result_field: "diagnostic".into(),
        }
    }

    const TIMEOUTS: Timeouts = Timeouts {
        request_seconds: 5,
        connect_seconds: 2,
    };

    #[test]
    fn column_carries_version() {
        let client = SdkClient::new(&target(8080, "http://localhost:8080/x".into()), &TIMEOUTS).unwrap();
        assert_eq!(client.column(), "Diagnostic SDK 5.2.1");
        assert_eq!(client.id(), "sdk:8080");
    }

    #[test]
    fn posts_base64_image_and_reads_diagnostic() {
        let server = FakeServer::start("200 OK", r#"{"diagnostic":"LIVE"}"#);
        let url = format!("http://{}/api/liveness", server.addr);
        let client = SdkClient::new(&target(server.addr.port(), url), &TIMEOUTS).unwrap();

        let diagnosis = client.evaluate(b"face-bytes");
        assert_eq!(diagnosis.cell(), "LIVE");

        let request = server.request();
        assert!(request.starts_with("POST /api/liveness"));
        assert!(request.contains(&general_purpose::STANDARD.encode(b"face-bytes")));
    }

    #[test]
    fn closed_port_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let url = format!("http://127.0.0.1:{port}/api");
        let client = SdkClient::new(&target(port, url), &TIMEOUTS).unwrap();
        match client.evaluate(b"x") {
            Diagnosis::Failure { kind, .. } => assert_eq!(kind, FailureKind::ConnectionError),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn silent_server_is_a_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                std::thread::sleep(Duration::from_secs(3));
                drop(stream);
            }
        });
        let timeouts = Timeouts {
            request_seconds: 1,
            connect_seconds: 1,
        };
        let url = format!("http://127.0.0.1:{port}/api");
        let client = SdkClient::new(&target(port, url), &timeouts).unwrap();
        assert_eq!(
            client.evaluate(b"x"),
            Diagnosis::failure(FailureKind::Timeout, "timed out after 1s")
        );
    }
}
