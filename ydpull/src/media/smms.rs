use std::time::Duration;

use reqwest::multipart;
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SMMS_BASE_URL: &str = "https://sm.ms/api/v2/";

/// SM.MS answers slowly under load; better to fall back to local storage
/// than to stall the whole pull.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SmmsError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid SM.MS endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("free tier allows 20 uploads per minute and 100 per hour")]
    RateLimited,
    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Minimal client for the SM.MS image hosting API.
#[derive(Clone)]
pub struct SmmsClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl SmmsClient {
    pub fn new(token: &str) -> Result<Self, SmmsError> {
        Self::with_base_url(token, DEFAULT_SMMS_BASE_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, SmmsError> {
        Ok(SmmsClient {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.to_string(),
        })
    }

    /// Uploads one image and returns its hosted URL. A re-upload of bytes
    /// the account already hosts returns the existing URL.
    pub async fn upload(&self, file_name: &str, body: Vec<u8>) -> Result<String, SmmsError> {
        let endpoint = self.base_url.join("upload")?;
        let part = multipart::Part::bytes(body).file_name(file_name.to_string());
        let form = multipart::Form::new().part("smfile", part);
        let response = self
            .http
            .post(endpoint)
            .header("Authorization", &self.token)
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        let payload: Value = response.json().await?;

        if payload.get("success").and_then(Value::as_bool).unwrap_or(false) {
            return payload
                .pointer("/data/url")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SmmsError::Rejected("success response without data.url".to_string()));
        }
        match payload.get("code").and_then(Value::as_str) {
            Some("image_repeated") => payload
                .get("images")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SmmsError::Rejected("repeated image without its url".to_string())),
            Some("flood") => Err(SmmsError::RateLimited),
            _ => Err(SmmsError::Rejected(
                payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unrecognized response")
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> SmmsClient {
        SmmsClient::with_base_url("secret-token", &format!("{}/", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn upload_returns_hosted_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("Authorization", "secret-token"))
            .and(body_string_contains("smfile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "url": "https://s2.loli.net/abc.png" }
            })))
            .mount(&server)
            .await;

        let url = client_for(&server)
            .await
            .upload("abc.png", b"png bytes".to_vec())
            .await
            .unwrap();
        assert_eq!(url, "https://s2.loli.net/abc.png");
    }

    #[tokio::test]
    async fn repeated_image_reuses_existing_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": "image_repeated",
                "images": "https://s2.loli.net/dup.png"
            })))
            .mount(&server)
            .await;

        let url = client_for(&server)
            .await
            .upload("dup.png", b"dup".to_vec())
            .await
            .unwrap();
        assert_eq!(url, "https://s2.loli.net/dup.png");
    }

    #[tokio::test]
    async fn flood_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": "flood",
                "message": "too fast"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .upload("x.png", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, SmmsError::RateLimited));
    }

    #[tokio::test]
    async fn other_failures_carry_the_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": "unauthorized",
                "message": "bad token"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .upload("x.png", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, SmmsError::Rejected(message) if message == "bad token"));
    }
}
