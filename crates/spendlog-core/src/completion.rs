//! Ollama-compatible HTTP text completion

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ingest::TextCompletion;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Calls a `/api/generate` endpoint with streaming disabled
pub struct OllamaCompletion {
    client: Client<HttpConnector>,
    endpoint: Uri,
    model: String,
}

impl OllamaCompletion {
    pub fn new(endpoint: &str, model: &str) -> CoreResult<Self> {
        let endpoint: Uri = endpoint.parse().map_err(|e| CoreError::Config {
            message: format!("invalid completion endpoint '{}': {}", endpoint, e),
        })?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            model: model.to_string(),
        })
    }
}

fn failed(message: impl Into<String>) -> CoreError {
    CoreError::CompletionFailed {
        message: message.into(),
    }
}

#[async_trait]
impl TextCompletion for OllamaCompletion {
    async fn complete(&self, prompt: &str) -> CoreResult<String> {
        let body = serde_json::to_vec(&GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        })
        .map_err(|e| failed(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|e| failed(e.to_string()))?;

        log::debug!("POST {} (model {})", self.endpoint, self.model);
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| failed(format!("{}: {}", self.endpoint, e)))?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| failed(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(failed(format!(
                "{} returned {}: {}",
                self.endpoint,
                status,
                String::from_utf8_lossy(&bytes).trim()
            )));
        }

        let parsed: GenerateResponse =
            serde_json::from_slice(&bytes).map_err(|e| failed(format!("unexpected reply: {}", e)))?;
        Ok(parsed.response)
    }
}
