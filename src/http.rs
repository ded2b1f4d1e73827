use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::ReconcileError;

pub const BROWSER_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
);

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

/// One GET with its own timeout and any extra headers a site insists on.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub timeout: Duration,
    pub headers: Vec<(&'static str, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

pub trait HttpClient: Send + Sync {
    fn get_text(&self, request: &HttpRequest) -> Result<String, ReconcileError>;

    fn get_json(&self, request: &HttpRequest) -> Result<Value, ReconcileError> {
        let body = self.get_text(request)?;
        serde_json::from_str(&body)
            .map_err(|err| ReconcileError::Http(format!("{}: {err}", request.url)))
    }
}

#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, ReconcileError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            "Accept-Language",
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ReconcileError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, ReconcileError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Err(ReconcileError::Http(err.to_string()));
                }
            }
        }
    }
}

impl HttpClient for ReqwestClient {
    fn get_text(&self, request: &HttpRequest) -> Result<String, ReconcileError> {
        debug!(url = request.url.as_str(), "GET");
        let response = self.send_with_retries(|| {
            let mut builder = self.client.get(&request.url).timeout(request.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(*name, value);
            }
            builder
        })?;
        let response = handle_status(response)?;
        response
            .text()
            .map_err(|err| ReconcileError::Http(err.to_string()))
    }
}

fn handle_status(response: Response) -> Result<Response, ReconcileError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .ok()
        .map(|body| body.chars().take(200).collect::<String>())
        .filter(|body| !body.trim().is_empty())
        .unwrap_or_else(|| "request failed".to_string());
    Err(ReconcileError::HttpStatus { status, message })
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
