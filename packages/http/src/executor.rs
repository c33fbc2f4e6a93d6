//! HTTP execution abstraction for testing.
//!
//! This module provides a trait for HTTP execution that can be mocked in tests,
//! avoiding the need for actual network calls.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::types::{Body, HttpRequest, HttpResponse};

/// Trait for executing HTTP requests.
///
/// Implementations can use real HTTP clients or mock responses for testing.
/// Calls arrive concurrently from filesystem worker threads.
pub trait HttpExecutor: Send + Sync {
    /// Execute an HTTP request and return the response with its body unread.
    ///
    /// Returns `Err` with a message if the request could not be carried out.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Production HTTP executor using reqwest.
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Create an executor that keeps reqwest's transport defaults.
    pub fn new() -> Result<Self, String> {
        let client = Client::builder().build().map_err(|e| e.to_string())?;
        Ok(Self { client })
    }

    /// Create an executor with an explicit per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self { client })
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let method: http::Method = request.method.into();

        let response = self
            .client
            .request(method, &request.url)
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body: Body::new(response),
        })
    }
}
