//! HTTP client for the Relic API.
//!
//! `ApiClient` owns the in-flight exchange: it attaches the client-key
//! header, emits the verbose trace, and runs the retry loop. Retry
//! decisions look at status codes only; interpreting response bodies
//! belongs to the typed decode helpers below, which run once per
//! logical request after retries are settled.

use std::thread;

use reqwest::blocking::{multipart, Client, Request, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::error::{retryable_status, CliError};
use crate::retry::RetryPlan;
use crate::types::{
    ClientInfo, ErrorResponse, RelicCreateRequest, RelicCreateResponse, RelicListResponse,
    RelicMetadata,
};

pub const CLIENT_KEY_HEADER: &str = "X-Client-Key";

pub struct ApiClient {
    http: Client,
    base_url: String,
    client_key: Option<String>,
    retry: RetryPlan,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> Result<Self, CliError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| CliError::Transport(e.to_string()))?;

        Ok(ApiClient {
            http,
            base_url: cfg.server.trim_end_matches('/').to_string(),
            client_key: (!cfg.client_key.is_empty()).then(|| cfg.client_key.clone()),
            retry: RetryPlan::default(),
        })
    }

    /// Swaps the backoff schedule; tests use millisecond waits.
    pub fn with_retry_plan(mut self, plan: RetryPlan) -> Self {
        self.retry = plan;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.client_key {
            builder = builder.header(CLIENT_KEY_HEADER, key);
        }
        builder
    }

    fn build(builder: RequestBuilder) -> Result<Request, CliError> {
        builder
            .build()
            .map_err(|e| CliError::Config(format!("invalid request: {e}")))
    }

    /// Runs one logical request, retrying transient failures per the
    /// retry plan. Transport errors and retryable statuses consume one
    /// wait each; any other response is returned as-is for the caller
    /// to inspect.
    fn execute(&self, req: Request) -> Result<Response, CliError> {
        trace_request(&req);

        let max_retries = self.retry.max_retries();
        let mut last_err = String::new();

        for attempt in 0..=max_retries {
            if let Some(wait) = self.retry.wait_before(attempt) {
                debug!("retry attempt {attempt}/{max_retries} after {wait:?}");
                thread::sleep(wait);
            }

            let attempt_req = req
                .try_clone()
                .ok_or_else(|| CliError::Transport("request body cannot be replayed".into()))?;

            match self.http.execute(attempt_req) {
                Err(err) => {
                    last_err = err.to_string();
                    if attempt < max_retries {
                        continue;
                    }
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if retryable_status(status) && attempt < max_retries {
                        last_err = format!("server returned {status}");
                        // Dropping the response closes its body.
                        continue;
                    }
                    debug!(status, "response");
                    return Ok(resp);
                }
            }
        }

        Err(CliError::Transport(format!("max retries exceeded: {last_err}")))
    }

    /// Single send for requests whose body streams from disk and
    /// cannot be replayed. Same headers and trace as `execute`.
    fn send_once(&self, req: Request) -> Result<Response, CliError> {
        trace_request(&req);
        let resp = self
            .http
            .execute(req)
            .map_err(|e| CliError::Transport(e.to_string()))?;
        debug!(status = resp.status().as_u16(), "response");
        Ok(resp)
    }

    /// `POST /api/v1/relics` with a prepared multipart form.
    pub fn create_relic(&self, form: multipart::Form) -> Result<RelicCreateResponse, CliError> {
        let req = Self::build(self.request(Method::POST, "/api/v1/relics").multipart(form))?;
        let resp = self.send_once(req)?;
        decode_json(resp, &[200, 201])
    }

    pub fn get_relic(&self, id: &str) -> Result<RelicMetadata, CliError> {
        let req = Self::build(self.request(Method::GET, &format!("/api/v1/relics/{id}")))?;
        decode_json(self.execute(req)?, &[200])
    }

    /// Raw content stream; the caller copies the body wherever it
    /// belongs.
    pub fn get_relic_content(&self, id: &str) -> Result<Response, CliError> {
        let req = Self::build(self.request(Method::GET, &format!("/{id}/raw")))?;
        let resp = self.execute(req)?;
        if resp.status().as_u16() != 200 {
            return Err(error_from_response(resp));
        }
        Ok(resp)
    }

    pub fn list_relics(&self, limit: u32, offset: u32) -> Result<RelicListResponse, CliError> {
        let path = format!("/api/v1/relics?limit={limit}&offset={offset}");
        let req = Self::build(self.request(Method::GET, &path))?;
        decode_json(self.execute(req)?, &[200])
    }

    pub fn list_client_relics(
        &self,
        limit: u32,
        offset: u32,
        access_level: Option<&str>,
    ) -> Result<RelicListResponse, CliError> {
        let mut path = format!("/api/v1/client/relics?limit={limit}&offset={offset}");
        if let Some(level) = access_level {
            path.push_str(&format!("&access_level={level}"));
        }
        let req = Self::build(self.request(Method::GET, &path))?;
        decode_json(self.execute(req)?, &[200])
    }

    pub fn fork_relic(
        &self,
        id: &str,
        body: &RelicCreateRequest,
    ) -> Result<RelicCreateResponse, CliError> {
        let req = Self::build(
            self.request(Method::POST, &format!("/api/v1/relics/{id}/fork"))
                .json(body),
        )?;
        decode_json(self.execute(req)?, &[200, 201])
    }

    pub fn delete_relic(&self, id: &str) -> Result<(), CliError> {
        let req = Self::build(self.request(Method::DELETE, &format!("/api/v1/relics/{id}")))?;
        let resp = self.execute(req)?;
        match resp.status().as_u16() {
            200 | 204 => Ok(()),
            _ => Err(error_from_response(resp)),
        }
    }

    pub fn register_client(&self) -> Result<ClientInfo, CliError> {
        let req = Self::build(self.request(Method::POST, "/api/v1/client/register"))?;
        decode_json(self.execute(req)?, &[200, 201])
    }
}

/// First characters of the key, enough to recognize it in a trace
/// without disclosing it.
pub fn redact_key(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}...")
}

fn trace_request(req: &Request) {
    debug!("{} {}", req.method(), req.url());
    for (name, value) in req.headers() {
        let shown = if name.as_str().eq_ignore_ascii_case(CLIENT_KEY_HEADER) {
            redact_key(value.to_str().unwrap_or("<binary>"))
        } else {
            value.to_str().unwrap_or("<binary>").to_string()
        };
        debug!("{name}: {shown}");
    }
}

/// Decodes a success body into `T`, or converts anything else into a
/// terminal error. A success status with an unparseable body is a
/// protocol mismatch, reported distinctly from remote errors.
fn decode_json<T: DeserializeOwned>(resp: Response, ok: &[u16]) -> Result<T, CliError> {
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .map_err(|e| CliError::Transport(format!("failed to read response body: {e}")))?;

    if !ok.contains(&status) {
        return Err(error_from_body(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| CliError::Protocol(format!("unexpected response body: {e}")))
}

fn error_from_response(resp: Response) -> CliError {
    let status = resp.status().as_u16();
    match resp.text() {
        Ok(body) => error_from_body(status, &body),
        Err(_) => CliError::from_status(status, format!("server returned {status}")),
    }
}

/// Extracts the server's `{detail}` envelope, falling back to the raw
/// body text when the envelope does not parse.
fn error_from_body(status: u16, body: &str) -> CliError {
    let detail = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(envelope) => envelope.detail,
        Err(_) if body.trim().is_empty() => format!("server returned {status}"),
        Err(_) => body.to_string(),
    };
    CliError::from_status(status, detail)
}
