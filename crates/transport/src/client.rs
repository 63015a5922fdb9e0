//! The HTTP transport and request sender.
//!
//! [`HttpClient`] owns one long-lived `reqwest::Client` with two policies
//! forced on:
//!
//! - **No redirects.** A 3xx reply is a protocol violation and is reported as
//!   [`TransportError::UnexpectedRedirect`]; no second request is made.
//! - **No connection reuse.** Idle connections are never pooled and every
//!   request says `Connection: close`, so unrelated commands never share a
//!   socket and a leaked response cannot poison a later request.
//!
//! Both make each exchange independent, which is what lets many tasks share
//! one client without coordination.

use std::sync::Arc;
use std::time::Duration;

use http::header::{CONNECTION, CONTENT_TYPE, LOCATION};
use http::HeaderValue;
use protocol::{ApiOptions, DaemonAddress, ErrorChannel, ErrorEnvelope};
use reqwest::{redirect, Body, StatusCode, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::errors::failed_attachment;
use crate::multipart::MultipartBody;
use crate::{Error, Request, RequestBuilder, Response, TransportError};

/// Longest body excerpt carried by [`TransportError::Status`].
const SNIPPET_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures an [`HttpClient`].
#[derive(Debug)]
#[must_use]
pub struct HttpClientBuilder {
    address: DaemonAddress,
    http: reqwest::ClientBuilder,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    defaults: ApiOptions,
}

impl HttpClientBuilder {
    /// Replaces the underlying `reqwest` builder (proxies, TLS roots, ...).
    ///
    /// The redirect and pooling policies are still forced on top of it.
    pub fn http_client(mut self, http: reqwest::ClientBuilder) -> Self {
        self.http = http;
        self
    }

    /// Sets a whole-request timeout. Unset by default, since streaming
    /// commands may legitimately run for a long time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the options applied to every request.
    pub fn defaults(mut self, defaults: ApiOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<HttpClient, TransportError> {
        let base = Url::parse(&self.address.api_base()).map_err(|e| TransportError::InvalidUrl {
            command: String::new(),
            reason: e.to_string(),
        })?;

        let mut http = self
            .http
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(0);
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            http = http.user_agent(user_agent);
        }
        let http = http
            .build()
            .map_err(|source| TransportError::ClientInit { source })?;

        debug!(address = %self.address, "created daemon client");
        Ok(HttpClient {
            shared: Arc::new(Shared {
                http,
                base,
                address: self.address,
            }),
            defaults: self.defaults,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Shared {
    http: reqwest::Client,
    base: Url,
    address: DaemonAddress,
}

/// Sends requests to one daemon.
///
/// Cheap to clone; clones share the transport. Configuration is read-only
/// after construction.
#[derive(Debug, Clone)]
pub struct HttpClient {
    shared: Arc<Shared>,
    defaults: ApiOptions,
}

impl HttpClient {
    /// Creates a client for `address` with default settings.
    pub fn new(address: DaemonAddress) -> Result<Self, TransportError> {
        Self::builder(address).build()
    }

    /// Starts configuring a client for `address`.
    pub fn builder(address: DaemonAddress) -> HttpClientBuilder {
        HttpClientBuilder {
            address,
            http: reqwest::Client::builder(),
            timeout: None,
            user_agent: None,
            defaults: ApiOptions::default(),
        }
    }

    /// Derives a client that shares this transport and layers `options` over
    /// the current defaults.
    #[must_use]
    pub fn with_options(&self, options: ApiOptions) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            defaults: self.defaults.merge(options),
        }
    }

    /// The daemon this client talks to.
    pub fn address(&self) -> &DaemonAddress {
        &self.shared.address
    }

    /// The options applied to every request.
    pub fn defaults(&self) -> ApiOptions {
        self.defaults
    }

    /// Starts a request for `command`, seeded with this client's defaults.
    pub fn request(&self, command: impl Into<String>) -> RequestBuilder {
        RequestBuilder::with_defaults(command, &self.defaults)
    }

    /// Returns the URL `request` will be sent to.
    pub fn url_for(&self, request: &Request) -> Result<Url, TransportError> {
        command_url(&self.shared.base, request.command(), &request.query_pairs())
    }

    /// Sends `request` and returns the live response once headers arrive.
    ///
    /// Non-success replies are turned into errors here: a daemon error
    /// envelope becomes [`Error::Daemon`], anything else a
    /// [`TransportError`].
    #[instrument(skip_all, fields(command = %request.command()))]
    pub async fn send(&self, request: Request, cancel: &CancellationToken) -> Result<Response, Error> {
        let (command, query, attachments, mut headers) = request.into_parts();
        let url = command_url(&self.shared.base, &command, &query)?;
        debug!(%url, attachments = attachments.len(), "sending request");

        // `header` appends: overrides must not duplicate the headers set below.
        headers.remove(CONNECTION);
        let body = MultipartBody::encode(attachments);
        if body.is_some() {
            headers.remove(CONTENT_TYPE);
        }
        let mut builder = self
            .shared
            .http
            .post(url)
            .headers(headers)
            .header(CONNECTION, HeaderValue::from_static("close"));
        if let Some(body) = body {
            builder = builder
                .header(CONTENT_TYPE, body.content_type())
                .body(Body::wrap_stream(body.into_stream()));
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            result = builder.send() => result,
        };
        let response = result.map_err(classify)?;
        let status = response.status();
        debug!(%status, "received response headers");

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            return Err(TransportError::UnexpectedRedirect { status, location }.into());
        }

        let response = Response::from_http(
            command.clone(),
            http::Response::<Body>::from(response),
            cancel.clone(),
        );
        if status.is_success() {
            return Ok(response);
        }
        Err(failure(command, status, response).await)
    }
}

/// Builds `<base><command>?arg=..&name=value..`.
fn command_url(base: &Url, command: &str, query: &[(String, String)]) -> Result<Url, TransportError> {
    let mut url = base
        .join(command.trim_start_matches('/'))
        .map_err(|e| TransportError::InvalidUrl {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Maps a `reqwest` failure that happened before a response arrived.
fn classify(source: reqwest::Error) -> TransportError {
    if let Some(name) = failed_attachment(&source) {
        return TransportError::Attachment { name, source };
    }
    if source.is_timeout() {
        TransportError::Timeout { source }
    } else if source.is_connect() {
        TransportError::Connect { source }
    } else {
        TransportError::Request { source }
    }
}

/// Turns a non-success reply into an error, preferring the daemon's envelope.
async fn failure(command: String, status: StatusCode, response: Response) -> Error {
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(error) => return error,
    };

    if let Ok(value) = serde_json::from_slice::<Value>(&body) {
        if let Some(envelope) = ErrorEnvelope::detect(&value) {
            debug!(%status, code = %envelope.code, "daemon rejected the command");
            return envelope.into_error(command, ErrorChannel::Envelope).into();
        }
    }

    let text = String::from_utf8_lossy(&body);
    let snippet: String = text.trim().chars().take(SNIPPET_CHARS).collect();
    TransportError::Status { status, snippet }.into()
}
