//! Schema-validated HTTP fetching for TurboCommerce.
//!
//! Sends a request, decodes the body as JSON and checks it against a
//! caller-supplied [`Schema`] before handing back a typed value.
//!
//! The order of checks is fixed:
//!
//! 1. The body is decoded as JSON whatever the status. A body that isn't JSON
//!    is a [`TransportError::Decode`].
//! 2. A non-2xx status is a [`TransportError::Status`] carrying the decoded
//!    body. The schema is not consulted, since error bodies rarely share the
//!    success shape.
//! 3. A 2xx body is validated. Failures are reported once to the client's
//!    [`DiagnosticSink`] and returned as [`FetchError::Schema`].
//!
//! Nothing is retried and no error is swallowed.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_fetch::{FetchClient, RequestOptions, Shape};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Session {
//!     user_id: String,
//!     expires_at: i64,
//! }
//!
//! let client = FetchClient::new().with_base_url("https://auth.example.com");
//!
//! let session: Session = client
//!     .get("/session")
//!     .bearer_auth(token)
//!     .fetch(&Shape::object([
//!         ("user_id", Shape::string()),
//!         ("expires_at", Shape::integer()),
//!     ]).typed::<Session>())
//!     .await?;
//!
//! // No schema: the decoded body comes back unchecked.
//! let raw = client.fetch_json("/health", RequestOptions::new()).await?;
//! ```

mod config;
mod diagnostics;
mod error;
mod request;
mod response;
mod schema;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

pub use config::{FetchConfig, BASE_URL_ENV, USER_AGENT_ENV};
pub use diagnostics::{DiagnosticSink, MemorySink, SchemaDiagnostic, TracingSink};
pub use error::{FetchError, TransportError};
pub use request::{CacheMode, Credentials, Method, Request, RequestOptions};
pub use response::Response;
pub use schema::{
    schema_fn, FnSchema, PathSegment, Schema, SchemaError, SchemaIssue, Shape, ShapeOf, Typed,
    Unchecked,
};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::HttpTransport;
#[cfg(target_arch = "wasm32")]
pub use transport::SpinTransport;
pub use transport::Transport;

static SHARED_CLIENT: OnceLock<FetchClient> = OnceLock::new();

/// The process-wide default client used by the free functions.
///
/// Its transport, and so its connection pool, is shared by every call.
pub fn shared_client() -> &'static FetchClient {
    SHARED_CLIENT.get_or_init(FetchClient::new)
}

/// Fetch `url` with the shared client and validate the body against `schema`.
pub async fn fetch_validated<S: Schema>(
    url: &str,
    schema: &S,
    options: RequestOptions,
) -> Result<S::Output, FetchError> {
    shared_client().fetch_validated(url, schema, options).await
}

/// Fetch `url` with the shared client and return the decoded body unchecked.
pub async fn fetch_json(url: &str, options: RequestOptions) -> Result<Value, FetchError> {
    shared_client().fetch_json(url, options).await
}

/// HTTP client that validates response bodies.
///
/// The transport and diagnostic sink are injected; by default requests go out
/// through the platform transport and schema failures are logged with
/// `tracing`. The client holds no per-request state and can be shared.
///
/// The platform transport is built on first use, and clones share it.
#[derive(Clone)]
pub struct FetchClient {
    base_url: Option<String>,
    default_headers: HashMap<String, String>,
    transport: Arc<OnceLock<Arc<dyn Transport>>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    /// Create a new HTTP client.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HashMap::new(),
            transport: Arc::new(OnceLock::new()),
            sink: Arc::new(TracingSink),
        }
    }

    /// Build a client from configuration.
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut client = Self::new();
        if let Some(user_agent) = &config.user_agent {
            client.transport = Arc::new(OnceLock::from(user_agent_transport(user_agent)?));
        }
        if let Some(base_url) = &config.base_url {
            client = client.with_base_url(base_url.clone());
        }
        for (key, value) in &config.default_headers {
            client = client.with_default_header(key.clone(), value.clone());
        }
        Ok(client)
    }

    /// Create a client with a base URL that will be prepended to all requests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a default header that will be included in all requests.
    ///
    /// A header of the same name set on a request takes precedence.
    pub fn with_default_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    /// Send requests through `transport`.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.transport = Arc::new(OnceLock::from(transport));
        self
    }

    /// Report schema failures to `sink`.
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Create a GET request.
    pub fn get(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Get, url)
    }

    /// Create a POST request.
    pub fn post(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Post, url)
    }

    /// Create a PUT request.
    pub fn put(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Put, url)
    }

    /// Create a PATCH request.
    pub fn patch(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Patch, url)
    }

    /// Create a DELETE request.
    pub fn delete(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Delete, url)
    }

    /// Create a request with a custom method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        ClientRequestBuilder {
            client: self,
            url: url.into(),
            options: RequestOptions::new().method(method),
        }
    }

    /// Fetch `url`, decode the body and validate it against `schema`.
    pub async fn fetch_validated<S: Schema>(
        &self,
        url: &str,
        schema: &S,
        options: RequestOptions,
    ) -> Result<S::Output, FetchError> {
        let request = self.prepare(url, options);
        let method = request.method;
        let url = request.url.clone();

        let response = self.dispatch(request).await?;
        let body = response.json_value()?;

        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
                payload: body,
            }
            .into());
        }

        schema.parse(&body).map_err(|error| {
            self.sink.schema_failure(&SchemaDiagnostic {
                method,
                url,
                status: response.status,
                error: error.clone(),
            });
            FetchError::Schema(error)
        })
    }

    /// Fetch `url` and return the decoded body without validation.
    ///
    /// Status is still checked: non-2xx responses fail as in
    /// [`fetch_validated`](Self::fetch_validated).
    pub async fn fetch_json(&self, url: &str, options: RequestOptions) -> Result<Value, FetchError> {
        self.fetch_validated(url, &Unchecked, options).await
    }

    /// Send a request and return the raw response, whatever its status.
    pub async fn send(&self, url: &str, options: RequestOptions) -> Result<Response, FetchError> {
        let request = self.prepare(url, options);
        Ok(self.dispatch(request).await?)
    }

    async fn dispatch(&self, request: Request) -> Result<Response, TransportError> {
        let method = request.method;
        let url = request.url.clone();
        tracing::debug!(%method, %url, "sending request");

        let transport = self.transport()?;
        match transport.send(request).await {
            Ok(response) => {
                tracing::debug!(%method, %url, status = response.status, "received response");
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(%method, %url, error = %e, "request failed");
                Err(e)
            }
        }
    }

    fn transport(&self) -> Result<Arc<dyn Transport>, TransportError> {
        if let Some(transport) = self.transport.get() {
            return Ok(transport.clone());
        }
        let built = default_transport()?;
        Ok(self.transport.get_or_init(|| built).clone())
    }

    fn prepare(&self, url: &str, mut options: RequestOptions) -> Request {
        for (key, value) in &self.default_headers {
            if !options.has_header(key) {
                options.headers.insert(key.clone(), value.clone());
            }
        }
        Request::new(self.resolve_url(url), options)
    }

    fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) => {
                if url.starts_with("http://") || url.starts_with("https://") {
                    return url.to_string();
                }
                let base = base.trim_end_matches('/');
                if url.is_empty() || url.starts_with(['/', '?', '#']) {
                    format!("{}{}", base, url)
                } else {
                    format!("{}/{}", base, url)
                }
            }
            None => url.to_string(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn default_transport() -> Result<Arc<dyn Transport>, TransportError> {
    Ok(Arc::new(HttpTransport::try_new()?))
}

#[cfg(target_arch = "wasm32")]
fn default_transport() -> Result<Arc<dyn Transport>, TransportError> {
    Ok(Arc::new(SpinTransport::new()))
}

#[cfg(not(target_arch = "wasm32"))]
fn user_agent_transport(user_agent: &str) -> Result<Arc<dyn Transport>, TransportError> {
    Ok(Arc::new(HttpTransport::with_user_agent(user_agent)?))
}

// Spin sets its own User-Agent.
#[cfg(target_arch = "wasm32")]
fn user_agent_transport(_user_agent: &str) -> Result<Arc<dyn Transport>, TransportError> {
    default_transport()
}

/// A request builder bound to a client.
pub struct ClientRequestBuilder<'a> {
    client: &'a FetchClient,
    url: String,
    options: RequestOptions,
}

impl<'a> ClientRequestBuilder<'a> {
    /// Add a header to the request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(key, value);
        self
    }

    /// Set the request body as raw bytes.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.options = self.options.body(body);
        self
    }

    /// Set the request body as a string.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.options = self.options.text(text);
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self, FetchError> {
        self.options = self.options.json(value)?;
        Ok(self)
    }

    /// Add a bearer token authorization header.
    pub fn bearer_auth(mut self, token: impl AsRef<str>) -> Self {
        self.options = self.options.bearer_auth(token);
        self
    }

    /// Add a basic authorization header.
    pub fn basic_auth(mut self, username: impl AsRef<str>, password: Option<&str>) -> Self {
        self.options = self.options.basic_auth(username, password);
        self
    }

    /// Set the credentials mode.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.options = self.options.credentials(credentials);
        self
    }

    /// Set the cache mode.
    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.options = self.options.cache(cache);
        self
    }

    /// Send the request and return the raw response.
    pub async fn send(self) -> Result<Response, FetchError> {
        self.client.send(&self.url, self.options).await
    }

    /// Send the request and validate the body against `schema`.
    pub async fn fetch<S: Schema>(self, schema: &S) -> Result<S::Output, FetchError> {
        self.client
            .fetch_validated(&self.url, schema, self.options)
            .await
    }

    /// Send the request and return the decoded body unchecked.
    pub async fn fetch_json(self) -> Result<Value, FetchError> {
        self.client.fetch_json(&self.url, self.options).await
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        FetchClient, FetchError, Method, RequestOptions, Response, Schema, SchemaError, Shape,
        TransportError, Typed,
    };
}
