use super::{Backend, Diagnosis, http};
use crate::config::{SaasTarget, Timeouts};
use anyhow::Result;
use base64::{Engine as _, engine::general_purpose};
use reqwest::blocking::Client;
use tracing::debug;

pub struct SaasClient {
    target: SaasTarget,
    timeouts: Timeouts,
    http: Client,
}

impl SaasClient {
    pub fn new(target: &SaasTarget, timeouts: &Timeouts) -> Result<Self> {
        Ok(Self {
            target: target.clone(),
            timeouts: *timeouts,
            http: http::build_client(timeouts)?,
        })
    }
}

impl Backend for SaasClient {
    fn id(&self) -> String {
        "saas".to_string()
    }

    fn column(&self) -> String {
        "Diagnostic SaaS".to_string()
    }

    fn evaluate(&self, image: &[u8]) -> Diagnosis {
        debug!("saas request url={} bytes={}", self.target.url, image.len());
        let body = serde_json::json!({
            "imageBuffer": general_purpose::STANDARD.encode(image),
        });
        let request = self
            .http
            .post(&self.target.url)
            .header("x-api-key", &self.target.api_key)
            .json(&body);
        http::send_for_diagnosis(request, &self.target.result_field, &self.timeouts)
    }
}
