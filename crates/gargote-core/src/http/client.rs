use std::collections::HashMap;
use std::time::Duration;

use crate::definition::model::HttpMethod;
use crate::error::GargoteError;
use crate::http::request::{PreparedRequest, RequestBody};
use crate::http::response::ResponseData;

/// Wrapper around a reqwest Client with builder-pattern configuration and
/// connection-pool settings.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Duration,
    user_agent: String,
    danger_accept_invalid_certs: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("gargote/{}", env!("CARGO_PKG_VERSION")),
            danger_accept_invalid_certs: false,
        }
    }
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<HttpClient, GargoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .user_agent(self.user_agent)
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(HttpClient { inner: client })
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

impl HttpClient {
    /// Returns a builder for customising the client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Send a prepared request and read the whole response body.
    ///
    /// `timeout` bounds the full exchange, body included. Any failure along
    /// the way is a [`GargoteError::Transport`].
    pub async fn send(
        &self,
        request: &PreparedRequest,
        timeout: Duration,
    ) -> Result<ResponseData, GargoteError> {
        let mut builder = self
            .inner
            .request(request.method.into(), &request.url)
            .timeout(timeout);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        if let Some(body) = &request.body {
            builder = match body {
                RequestBody::Text(text) => builder.body(text.clone()),
                RequestBody::Json(value) => builder.json(value),
            };
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        // Collect headers before the body consumes the response.
        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers
                    .entry(name.as_str().to_lowercase())
                    .or_insert_with(|| v.to_string());
            }
        }

        let body = response.bytes().await?.to_vec();

        Ok(ResponseData {
            status,
            headers,
            body,
        })
    }
}
