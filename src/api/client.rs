//! Authenticated API session
//!
//! An [`ApiClient`] logs in when it is created and logs out when it is
//! dropped, so every exit path releases the session token. Requests carry
//! the token, transient network failures are retried with backoff, and a
//! 401 triggers one re-login before the request is retried.

use std::time::Instant;

use serde_json::{Value, json};

use super::config::ClientConfig;
use super::error::{ApiError, ApiResult};
use super::pagination::{FetchOptions, PageCollector, PaginatedResult, RESULTS_KEY};
use super::query::Query;
use super::sideload::{Sideload, resolve_sideloads, setup_sideloads};
use super::transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestTransport,
    TransportError,
};

const LOGIN_ENDPOINT: &str = "auth/login";
const LOGOUT_ENDPOINT: &str = "auth/logout";

/// Client for the hosted extraction API
///
/// Not safe for concurrent use; every request takes `&mut self`.
pub struct ApiClient<T: HttpTransport = ReqwestTransport> {
    config: ClientConfig,
    api_url: String,
    transport: T,
    token: Option<String>,
    /// The token came from our own login and must be released
    owns_token: bool,
}

impl ApiClient<ReqwestTransport> {
    /// Log in over HTTPS with the blocking reqwest transport
    pub fn connect(config: ClientConfig) -> ApiResult<Self> {
        let transport =
            ReqwestTransport::new(config.timeout).map_err(|e| ApiError::Transport {
                endpoint: config.api_url(),
                message: e.to_string(),
            })?;
        Self::with_transport(config, transport)
    }
}

impl<T: HttpTransport> ApiClient<T> {
    /// Create a session over the given transport
    ///
    /// A pre-issued token is used as is; otherwise the client logs in with
    /// the configured credentials.
    pub fn with_transport(config: ClientConfig, transport: T) -> ApiResult<Self> {
        let api_url = config.api_url();
        let mut client = Self {
            token: config.token().map(str::to_string),
            config,
            api_url,
            transport,
            owns_token: false,
        };

        if client.token.is_none() {
            if !client.config.has_credentials() {
                return Err(ApiError::InvalidArgument(
                    "either a username and password or a token is required".to_string(),
                ));
            }
            client.login()?;
        }
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Root URL endpoints are resolved against
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange the configured credentials for a session token
    pub fn login(&mut self) -> ApiResult<()> {
        let (Some(username), Some(password)) = (&self.config.username, self.config.password())
        else {
            return Err(ApiError::InvalidArgument(
                "no credentials configured for login".to_string(),
            ));
        };

        let mut body = json!({ "username": username, "password": password });
        if let Some(lifetime) = self.config.max_token_lifetime {
            body["max_token_lifetime_s"] = json!(lifetime.as_secs());
        }

        let url = self.url_for(LOGIN_ENDPOINT);
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: url.clone(),
            headers: self.base_headers(),
            body: RequestBody::Json(body),
        };
        let response = self.execute_with_retry(&request)?;
        if response.status == 401 {
            return Err(ApiError::Authentication(
                "Login failed with the provided credentials.".to_string(),
            ));
        }
        let value = parse_json(&check_status(response, &url)?, &url)?;
        let key = value
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Protocol {
                endpoint: url.clone(),
                message: "login response has no 'key'".to_string(),
            })?;

        self.token = Some(key.to_string());
        self.owns_token = true;
        tracing::info!("Logged in to {} as {}", self.api_url, username);
        Ok(())
    }

    /// Invalidate the session token
    ///
    /// The token is forgotten even when the server call fails.
    pub fn logout(&mut self) -> ApiResult<()> {
        if self.token.is_none() {
            return Ok(());
        }
        let url = self.url_for(LOGOUT_ENDPOINT);
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: url.clone(),
            headers: self.auth_headers(),
            body: RequestBody::Json(json!({})),
        };
        self.token = None;
        self.owns_token = false;

        let response = self.execute_with_retry(&request)?;
        // An expired token is as good as a released one
        if response.status != 401 {
            check_status(response, &url)?;
        }
        tracing::info!("Logged out of {}", self.api_url);
        Ok(())
    }

    /// Release the session and report a failed logout
    pub fn close(mut self) -> ApiResult<()> {
        if self.owns_token {
            self.logout()
        } else {
            Ok(())
        }
    }

    pub fn get(&mut self, endpoint: &str, query: &Query) -> ApiResult<Value> {
        let (response, url) = self.send(HttpMethod::Get, endpoint, query, RequestBody::Empty)?;
        parse_json(&response, &url)
    }

    /// Raw body of a GET, for non-JSON payloads such as exports
    pub fn get_bytes(&mut self, endpoint: &str, query: &Query) -> ApiResult<Vec<u8>> {
        let (response, _) = self.send(HttpMethod::Get, endpoint, query, RequestBody::Empty)?;
        Ok(response.body)
    }

    pub fn post(&mut self, endpoint: &str, body: &Value) -> ApiResult<Value> {
        self.send_json(HttpMethod::Post, endpoint, RequestBody::Json(body.clone()))
    }

    pub fn put(&mut self, endpoint: &str, body: &Value) -> ApiResult<Value> {
        self.send_json(HttpMethod::Put, endpoint, RequestBody::Json(body.clone()))
    }

    pub fn patch(&mut self, endpoint: &str, body: &Value) -> ApiResult<Value> {
        self.send_json(HttpMethod::Patch, endpoint, RequestBody::Json(body.clone()))
    }

    pub fn delete(&mut self, endpoint: &str) -> ApiResult<Value> {
        self.send_json(HttpMethod::Delete, endpoint, RequestBody::Empty)
    }

    /// Follow `pagination.next` until the list is exhausted
    pub fn get_paginated(&mut self, endpoint: &str, query: &Query) -> ApiResult<PaginatedResult> {
        self.get_paginated_with(endpoint, query, &[], &FetchOptions::default())
    }

    /// Paginated GET with sideloads and caller-imposed cancellation
    pub fn get_paginated_with(
        &mut self,
        endpoint: &str,
        query: &Query,
        sideloads: &[Sideload],
        options: &FetchOptions,
    ) -> ApiResult<PaginatedResult> {
        let mut query = query.clone();
        setup_sideloads(&mut query, sideloads)?;

        let first_url = query.apply_to(&self.url_for(endpoint));
        let mut collector = PageCollector::new(RESULTS_KEY, first_url.clone());
        let mut next = Some(first_url);

        while let Some(url) = next {
            options.check(collector.pages())?;
            let page = self.get(&url, &Query::new())?;
            next = collector.absorb(page)?;
        }

        let result = collector.finish(sideloads);
        tracing::debug!(
            "Fetched {} {} in {} pages",
            result.results.len(),
            endpoint,
            result.pages
        );
        Ok(result)
    }

    /// Resolve references in `objects` by listing each related collection
    ///
    /// For endpoints that cannot sideload on the server side.
    pub fn sideload(
        &mut self,
        mut objects: Vec<Value>,
        resources: &[Sideload],
    ) -> ApiResult<Vec<Value>> {
        let mut collections = serde_json::Map::new();
        for resource in resources {
            let listed = self.get_paginated(resource.plural(), &Query::new())?;
            collections.insert(resource.plural().to_string(), Value::Array(listed.results));
        }
        resolve_sideloads(&mut objects, &collections, resources);
        Ok(objects)
    }

    pub(crate) fn send_json(
        &mut self,
        method: HttpMethod,
        endpoint: &str,
        body: RequestBody,
    ) -> ApiResult<Value> {
        let (response, url) = self.send(method, endpoint, &Query::new(), body)?;
        parse_json(&response, &url)
    }

    /// Send an authenticated request; returns the response and its URL
    fn send(
        &mut self,
        method: HttpMethod,
        endpoint: &str,
        query: &Query,
        body: RequestBody,
    ) -> ApiResult<(HttpResponse, String)> {
        let url = query.apply_to(&self.url_for(endpoint));
        let mut request = HttpRequest {
            method,
            url: url.clone(),
            headers: self.auth_headers(),
            body,
        };

        tracing::debug!("{} {}", method.as_str(), url);
        let mut response = self.execute_with_retry(&request)?;

        if response.status == 401 && self.config.has_credentials() {
            tracing::info!("Session token rejected, logging in again");
            self.login()?;
            request.headers = self.auth_headers();
            response = self.execute_with_retry(&request)?;
        }
        if response.status == 401 {
            return Err(ApiError::Authentication(format!(
                "{} {} was rejected as unauthorized",
                method.as_str(),
                url
            )));
        }

        Ok((check_status(response, &url)?, url))
    }

    fn execute_with_retry(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let policy = &self.config.retry;
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            match self.transport.execute(request) {
                Ok(response) => return Ok(response),
                Err(TransportError::Fatal(message)) => {
                    return Err(ApiError::Transport {
                        endpoint: request.url.clone(),
                        message,
                    });
                }
                Err(TransportError::Transient(message)) => {
                    let delay = policy.delay_for(attempts);
                    attempts += 1;
                    if attempts >= policy.attempts || started.elapsed() + delay > policy.stop_after
                    {
                        return Err(ApiError::Transient {
                            endpoint: request.url.clone(),
                            attempts,
                            message,
                        });
                    }
                    tracing::warn!(
                        "{} {} failed (attempt {}/{}): {}; retrying in {:?}",
                        request.method.as_str(),
                        request.url,
                        attempts,
                        policy.attempts,
                        message,
                        delay
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }

    /// Absolute URLs (pagination cursors, object references) pass through
    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.api_url, endpoint.trim_start_matches('/'))
        }
    }

    fn base_headers(&self) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), user_agent()),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.base_headers();
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Token {}", token)));
        }
        headers
    }
}

impl<T: HttpTransport> Drop for ApiClient<T> {
    fn drop(&mut self) {
        if self.owns_token
            && let Err(e) = self.logout()
        {
            tracing::warn!("Logout from {} failed: {}", self.api_url, e);
        }
    }
}

pub fn user_agent() -> String {
    format!(
        "docschema/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

fn check_status(response: HttpResponse, url: &str) -> ApiResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Request {
            status: response.status,
            endpoint: url.to_string(),
            body: response.text(),
        })
    }
}

/// Empty bodies (204 and friends) parse as `null`
fn parse_json(response: &HttpResponse, url: &str) -> ApiResult<Value> {
    if response.status == 204 || response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Protocol {
        endpoint: url.to_string(),
        message: format!("malformed JSON: {}", e),
    })
}
