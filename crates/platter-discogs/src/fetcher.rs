// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONNECTION, CONTENT_LENGTH,
    CONTENT_TYPE, USER_AGENT,
};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Proxy, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};
use url::Url;

use crate::auth::{Auth, Authorizer};
use crate::cache::{CacheKey, ResponseCache};
use crate::constants::{OutputFormat, API_BASE_URL, API_VERSION, DEFAULT_USER_AGENT, IMAGE_BASE_URL};
use crate::error::{DiscogsError, Result};
use crate::pagination::{Page, PageItems};
use crate::rate_limiter::{
    RateLimitSnapshot, RateLimiter, RateLimiterConfig, DEFAULT_REFRESH_INTERVAL,
    DEFAULT_REQUEST_LIMIT, DEFAULT_REQUEST_LIMIT_AUTH,
};
use crate::request::{transform_body, QueryParams};

/// Ceiling Discogs currently applies to this client, per minute.
pub const RATE_LIMIT_HEADER: &str = "x-discogs-ratelimit";
/// Requests left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-discogs-ratelimit-remaining";

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204 No Content.
    Empty,
    Json(Value),
    Binary(Bytes),
}

impl Payload {
    /// Decode as `T`. An empty payload decodes from `{}`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Payload::Empty => Ok(serde_json::from_value(Value::Object(Map::new()))?),
            Payload::Json(value) => Ok(serde_json::from_value(value)?),
            Payload::Binary(_) => Err(DiscogsError::Configuration(
                "binary response cannot be decoded as JSON".to_string(),
            )),
        }
    }

    pub fn into_bytes(self) -> Result<Bytes> {
        match self {
            Payload::Empty => Ok(Bytes::new()),
            Payload::Json(value) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
            Payload::Binary(bytes) => Ok(bytes),
        }
    }
}

/// How the caller wants the response body handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Binary,
}

/// Empty success body, e.g. from DELETE endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmptyResponse {}

/// Rate-limited transport shared by every Discogs call of one client.
pub struct Fetcher {
    client: Client,
    base_url: String,
    image_base_url: String,
    output_format: OutputFormat,
    user_agent: String,
    headers: HeaderMap,
    authorizer: Option<Arc<dyn Authorizer>>,
    rate_limiter: RateLimiter,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("base_url", &self.base_url)
            .field("image_base_url", &self.image_base_url)
            .field("output_format", &self.output_format)
            .field("user_agent", &self.user_agent)
            .field("authenticated", &self.is_authenticated())
            .field("rate_limit", &self.rate_limiter.snapshot())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl Fetcher {
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::default()
    }

    /// Schedule a request and decode its JSON body.
    ///
    /// `uri` is either a path below the API base URL or an absolute URL on the
    /// API or image host. An absolute URL cannot be combined with a query.
    #[instrument(skip(self, query, body))]
    pub async fn schedule<T: DeserializeOwned>(
        &self,
        uri: &str,
        query: Option<&QueryParams>,
        method: Method,
        body: Option<Value>,
    ) -> Result<T> {
        self.fetch(uri, query, method, body, ResponseKind::Json)
            .await?
            .into_json()
    }

    /// Schedule a request whose body is binary (images, export downloads).
    #[instrument(skip(self, query))]
    pub async fn schedule_bytes(
        &self,
        uri: &str,
        query: Option<&QueryParams>,
        method: Method,
    ) -> Result<Bytes> {
        self.fetch(uri, query, method, None, ResponseKind::Binary)
            .await?
            .into_bytes()
    }

    pub async fn get<T: DeserializeOwned>(&self, uri: &str, query: Option<&QueryParams>) -> Result<T> {
        self.schedule(uri, query, Method::GET, None).await
    }

    /// Schedule a request and return the undecoded payload.
    pub async fn fetch(
        &self,
        uri: &str,
        query: Option<&QueryParams>,
        method: Method,
        body: Option<Value>,
        kind: ResponseKind,
    ) -> Result<Payload> {
        let url = self.resolve_url(uri, query)?;
        let body = body
            .map(|body| serde_json::to_string(&transform_body(body)))
            .transpose()?;
        let headers = self.request_headers(url.as_str(), &method, body.as_deref())?;

        match &self.cache {
            Some(cache) => {
                let key = CacheKey {
                    method: method.clone(),
                    url: url.to_string(),
                    body: body.clone(),
                };
                cache
                    .get_or_fetch(key, self.send(url, method, headers, body, kind).boxed())
                    .await
            }
            None => self.send(url, method, headers, body, kind).await,
        }
    }

    /// Follow the `next` link of a page, if there is one.
    pub async fn next_page<T: DeserializeOwned>(&self, current: &Page<T>) -> Result<Option<Page<T>>> {
        match current.pagination.urls.next.as_deref() {
            Some(next) => self.get(next, None).await.map(Some),
            None => Ok(None),
        }
    }

    /// Collect the items of `first` and every page reachable through `next` links.
    pub async fn all_via_next<T, P>(&self, first: Page<T>, mut on_progress: P) -> Result<Vec<T::Item>>
    where
        T: PageItems + DeserializeOwned,
        P: FnMut(&[T::Item]),
    {
        let mut all = Vec::new();
        let mut page = Some(first);

        while let Some(current) = page.take() {
            let next = current.pagination.urls.next.clone();
            let items = current.data.into_items();
            on_progress(&items);
            all.extend(items);

            if let Some(next) = next {
                page = Some(self.get(&next, None).await?);
            }
        }

        Ok(all)
    }

    pub fn rate_limit(&self) -> RateLimitSnapshot {
        self.rate_limiter.snapshot()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn is_authenticated(&self) -> bool {
        authenticates(self.authorizer.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    fn resolve_url(&self, uri: &str, query: Option<&QueryParams>) -> Result<Url> {
        let query = query.filter(|query| !query.is_empty());

        if has_base(uri, &self.base_url) || has_base(uri, &self.image_base_url) {
            if query.is_some() {
                return Err(DiscogsError::Configuration(format!(
                    "query parameters cannot be combined with a full URL: {}",
                    uri
                )));
            }
            return Ok(Url::parse(uri)?);
        }

        if uri.contains("://") {
            return Err(DiscogsError::Configuration(format!(
                "URL is not on a Discogs host: {}",
                uri
            )));
        }

        let separator = if uri.starts_with('/') { "" } else { "/" };
        let mut url = Url::parse(&format!("{}{}{}", self.base_url, separator, uri))?;
        if let Some(query) = query {
            url.query_pairs_mut().extend_pairs(query.defined());
        }
        Ok(url)
    }

    /// Headers for a single request, copied from the client defaults.
    fn request_headers(&self, url: &str, method: &Method, body: Option<&str>) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();

        if let Some(value) = self
            .authorizer
            .as_ref()
            .and_then(|authorizer| authorizer.authorization(url, method))
        {
            let mut value = HeaderValue::from_str(&value).map_err(|_| {
                DiscogsError::Configuration(
                    "authorization header contains invalid characters".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(body) = body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        Ok(headers)
    }

    async fn send(
        &self,
        url: Url,
        method: Method,
        headers: HeaderMap,
        body: Option<String>,
        kind: ResponseKind,
    ) -> Result<Payload> {
        let response = {
            let _permit = self.rate_limiter.acquire().await?;
            trace!(target: "discogs", "{} {}", method, url);

            let mut request = self.client.request(method, url).headers(headers);
            if let Some(body) = body {
                request = request.body(body);
            }
            request.send().await?
        };

        self.observe_rate_limit(response.headers());
        interpret(response, kind).await
    }

    fn observe_rate_limit(&self, headers: &HeaderMap) {
        let ceiling = header_number(headers, RATE_LIMIT_HEADER);
        let remaining = header_number(headers, RATE_LIMIT_REMAINING_HEADER);
        if ceiling.is_some() || remaining.is_some() {
            trace!(target: "discogs", ?ceiling, ?remaining, "server rate limit");
            self.rate_limiter.apply_server_limits(ceiling, remaining);
        }
    }
}

fn authenticates(authorizer: Option<&dyn Authorizer>) -> bool {
    authorizer.is_some_and(|authorizer| authorizer.is_authenticated())
}

/// True if `uri` is `base` itself or a path/query below it.
fn has_base(uri: &str, base: &str) -> bool {
    match uri.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

async fn interpret(response: Response, kind: ResponseKind) -> Result<Payload> {
    let status = response.status();
    debug!(target: "discogs", %status, "response status");

    if status == StatusCode::UNAUTHORIZED {
        return Err(DiscogsError::Unauthorized);
    }

    if status == StatusCode::UNPROCESSABLE_ENTITY || status.as_u16() >= 500 {
        let body = response.text().await?;
        return Err(DiscogsError::Protocol {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }

    if !status.is_success() {
        return Err(DiscogsError::Protocol {
            status: status.as_u16(),
            message: reason_phrase(status).to_string(),
        });
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(Payload::Empty);
    }

    let body = response.bytes().await?;
    match kind {
        ResponseKind::Binary => Ok(Payload::Binary(body)),
        ResponseKind::Json if body.is_empty() => Ok(Payload::Empty),
        ResponseKind::Json => Ok(Payload::Json(serde_json::from_slice(&body)?)),
    }
}

fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Status")
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<Vec<Violation>>,
}

#[derive(Debug, Deserialize)]
struct Violation {
    #[serde(default)]
    loc: Vec<Value>,
    #[serde(default)]
    msg: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc = self
            .loc
            .iter()
            .map(|part| match part {
                Value::String(part) => part.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}: {} ({})", loc, self.msg, self.kind)
    }
}

/// Message for a 422/5xx response, combining field violations when present.
fn error_message(status: StatusCode, body: &str) -> String {
    let Ok(error) = serde_json::from_str::<ErrorBody>(body) else {
        return reason_phrase(status).to_string();
    };

    let violations = error
        .detail
        .filter(|detail| !detail.is_empty())
        .map(|detail| {
            detail
                .iter()
                .map(Violation::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        });

    match (error.message, violations) {
        (Some(message), Some(violations)) => format!("{}: {}", message, violations),
        (None, Some(violations)) => violations,
        (Some(message), None) => message,
        (None, None) => reason_phrase(status).to_string(),
    }
}

/// Builder for configuring a [`Fetcher`].
pub struct FetcherBuilder {
    base_url: String,
    image_base_url: String,
    user_agent: String,
    output_format: OutputFormat,
    authorizer: Option<Arc<dyn Authorizer>>,
    request_limit: u32,
    request_limit_auth: u32,
    refresh_interval: Duration,
    concurrency: usize,
    timeout: Duration,
    proxy: Option<Proxy>,
    http_client: Option<Client>,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            image_base_url: IMAGE_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_format: OutputFormat::Discogs,
            authorizer: None,
            request_limit: DEFAULT_REQUEST_LIMIT,
            request_limit_auth: DEFAULT_REQUEST_LIMIT_AUTH,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            concurrency: 1,
            timeout: Duration::from_secs(30),
            proxy: None,
            http_client: None,
            cache: None,
        }
    }
}

impl FetcherBuilder {
    /// Set a custom API base URL (useful for testing with mock servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn image_base_url(mut self, url: impl Into<String>) -> Self {
        self.image_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    pub fn auth(self, auth: Auth) -> Self {
        self.authorizer(auth.into_authorizer())
    }

    /// Any header provider; the client counts as authenticated.
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Requests per interval when unauthenticated (default 25).
    pub fn request_limit(mut self, limit: u32) -> Self {
        self.request_limit = limit;
        self
    }

    /// Requests per interval when authenticated (default 60).
    pub fn request_limit_auth(mut self, limit: u32) -> Self {
        self.request_limit_auth = limit;
        self
    }

    pub fn request_limit_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Use a preconfigured HTTP client; timeout and proxy settings are ignored.
    /// Its redirect policy is used as-is.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Fetcher> {
        let client = match self.http_client {
            Some(client) => client,
            None => {
                // Redirects are surfaced as 3xx errors so no request leaves the Discogs hosts.
                let mut builder = Client::builder()
                    .timeout(self.timeout)
                    .redirect(Policy::none());
                if let Some(proxy) = self.proxy {
                    builder = builder.proxy(proxy);
                }
                builder.build()?
            }
        };

        let max_requests = if authenticates(self.authorizer.as_deref()) {
            self.request_limit_auth
        } else {
            self.request_limit
        };
        let rate_limiter = RateLimiter::new(
            RateLimiterConfig::new(max_requests, self.refresh_interval)
                .concurrency(self.concurrency),
        );

        let headers = default_headers(&self.user_agent, self.output_format)?;
        debug!(target: "discogs", base_url = %self.base_url, max_requests, "initialized Discogs fetcher");

        Ok(Fetcher {
            client,
            base_url: self.base_url,
            image_base_url: self.image_base_url,
            output_format: self.output_format,
            user_agent: self.user_agent,
            headers,
            authorizer: self.authorizer,
            rate_limiter,
            cache: self.cache,
        })
    }
}

fn default_headers(user_agent: &str, output_format: OutputFormat) -> Result<HeaderMap> {
    let accept = format!("application/vnd.discogs.{}.{}+json", API_VERSION, output_format);

    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_str(&accept)
            .map_err(|_| DiscogsError::Configuration("invalid output format".to_string()))?,
    );
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).map_err(|_| {
            DiscogsError::Configuration(format!("invalid user agent: {:?}", user_agent))
        })?,
    );
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> Fetcher {
        Fetcher::builder().build().unwrap()
    }

    #[test]
    fn test_resolve_path_with_query() {
        let query = QueryParams::new()
            .insert("page", 2)
            .insert_opt("currency", None::<String>);
        let url = fetcher()
            .resolve_url("/users/rodneyfool/wants", Some(&query))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.discogs.com/users/rodneyfool/wants?page=2"
        );
    }

    #[test]
    fn test_resolve_full_urls() {
        let fetcher = fetcher();
        let image = fetcher
            .resolve_url("https://img.discogs.com/abc/R-1.jpg", None)
            .unwrap();
        assert_eq!(image.as_str(), "https://img.discogs.com/abc/R-1.jpg");

        let next = fetcher
            .resolve_url("https://api.discogs.com/artists/1/releases?page=2", None)
            .unwrap();
        assert_eq!(next.query(), Some("page=2"));
    }

    #[test]
    fn test_full_url_with_query_is_rejected() {
        let query = QueryParams::new().insert("page", 1);
        let result = fetcher().resolve_url("https://img.discogs.com/abc.jpg", Some(&query));
        assert!(matches!(result, Err(DiscogsError::Configuration(_))));
    }

    #[test]
    fn test_full_url_with_empty_query_is_allowed() {
        let query = QueryParams::new().insert_opt("page", None::<u32>);
        assert!(fetcher()
            .resolve_url("https://img.discogs.com/abc.jpg", Some(&query))
            .is_ok());
    }

    #[test]
    fn test_foreign_host_is_rejected() {
        let fetcher = fetcher();
        for uri in [
            "https://example.com/file.jpg",
            "https://api.discogs.com.evil.test/releases/1",
        ] {
            assert!(matches!(
                fetcher.resolve_url(uri, None),
                Err(DiscogsError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_default_headers() {
        let headers = default_headers("platter-test/1.0", OutputFormat::Discogs).unwrap();
        assert_eq!(
            headers[ACCEPT],
            "application/vnd.discogs.v2.discogs+json"
        );
        assert_eq!(headers[USER_AGENT], "platter-test/1.0");
        assert_eq!(headers[CONNECTION], "close");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_request_headers_are_per_request() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let authorizer = move |_: &str, method: &Method| {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Some(format!("Test {} {}", method, n))
        };
        let fetcher = Fetcher::builder()
            .authorizer(Arc::new(authorizer))
            .build()
            .unwrap();

        let first = fetcher
            .request_headers("https://api.discogs.com/a", &Method::GET, None)
            .unwrap();
        let second = fetcher
            .request_headers("https://api.discogs.com/b", &Method::POST, Some("{\"a\":1}"))
            .unwrap();

        assert_eq!(first[AUTHORIZATION], "Test GET 0");
        assert!(first.get(CONTENT_LENGTH).is_none());
        assert_eq!(second[AUTHORIZATION], "Test POST 1");
        assert_eq!(second[CONTENT_LENGTH], "7");
        assert!(fetcher.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_authenticated_ceiling() {
        let anonymous = fetcher();
        assert_eq!(anonymous.rate_limit().ceiling, 25);

        let authenticated = Fetcher::builder()
            .auth(Auth::token("t"))
            .build()
            .unwrap();
        assert_eq!(authenticated.rate_limit().ceiling, 60);
        assert!(authenticated.is_authenticated());
    }

    #[test]
    fn test_blank_token_keeps_anonymous_ceiling() {
        let fetcher = Fetcher::builder()
            .auth(Auth::token("   "))
            .build()
            .unwrap();
        assert!(!fetcher.is_authenticated());
        assert_eq!(fetcher.rate_limit().ceiling, 25);

        let headers = fetcher
            .request_headers("https://api.discogs.com/oauth/identity", &Method::GET, None)
            .unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_error_message_with_detail() {
        let body = r#"{
            "message": "Validation failed",
            "detail": [
                {"loc": ["body", "price"], "msg": "value is not a valid float", "type": "type_error.float"},
                {"loc": ["body", "items", 0], "msg": "field required", "type": "value_error.missing"}
            ]
        }"#;
        assert_eq!(
            error_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            "Validation failed: body.price: value is not a valid float (type_error.float); \
             body.items.0: field required (value_error.missing)"
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message": "Boom"}"#),
            "Boom"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            "Bad Gateway"
        );
    }

    #[test]
    fn test_payload_empty_decodes_as_object() {
        let empty: EmptyResponse = Payload::Empty.into_json().unwrap();
        assert_eq!(empty, EmptyResponse {});
        let value: Value = Payload::Empty.into_json().unwrap();
        assert_eq!(value, serde_json::json!({}));
    }
}
