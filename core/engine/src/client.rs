/* Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

use crate::error::RequestError;
use kload_common::{EngineError, LoadProfileSpec, PatchType};
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default per-request timeout, applied at the transport layer.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where and how to reach the API server. Kubeconfig discovery happens
/// upstream; the engine only consumes the resolved endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub bearer_token: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            bearer_token: None,
            insecure_skip_tls_verify: false,
        }
    }
}

/// One transport against the API server. Cloning shares the underlying
/// connection pool; `build_clients` creates `conns` distinct transports.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

/// Builds the transport pool for one run: `spec.conns` clients honouring
/// the profile's content type and HTTP version choice.
pub fn build_clients(
    spec: &LoadProfileSpec,
    config: &ClientConfig,
) -> Result<Vec<RestClient>, EngineError> {
    (0..spec.conns)
        .map(|_| RestClient::new(spec, config))
        .collect()
}

impl RestClient {
    fn new(spec: &LoadProfileSpec, config: &ClientConfig) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(spec.content_type.accept_header()),
        );
        if let Some(token) = &config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| EngineError::Internal(format!("invalid bearer token: {err}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify);
        if spec.disable_http2 {
            builder = builder.http1_only();
        }
        let http = builder
            .build()
            .map_err(|err| EngineError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn get(&self) -> RestRequest {
        self.request(Method::GET)
    }

    pub fn post(&self) -> RestRequest {
        self.request(Method::POST)
    }

    pub fn delete(&self) -> RestRequest {
        self.request(Method::DELETE)
    }

    pub fn patch(&self, patch_type: PatchType) -> RestRequest {
        let mut request = self.request(Method::PATCH);
        request.content_type = Some(patch_type.content_type());
        request
    }

    fn request(&self, method: Method) -> RestRequest {
        RestRequest {
            http: self.http.clone(),
            method,
            url: self.base_url.clone(),
            body: None,
            content_type: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: 0,
            build_error: None,
        }
    }
}

/// One fully-parameterised request. Construction is infallible; anything
/// that goes wrong along the way is surfaced when the request is sent.
#[derive(Debug)]
pub struct RestRequest {
    http: reqwest::Client,
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
    content_type: Option<&'static str>,
    timeout: Duration,
    max_retries: u32,
    build_error: Option<String>,
}

impl RestRequest {
    /// Appends absolute path components, e.g.
    /// `["apis", "apps", "v1", "namespaces", "default", "deployments"]`.
    pub fn abs_path<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let url_display = self.url.to_string();
        match self.url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().extend(components);
            }
            Err(()) => {
                self.build_error = Some(format!("base url {url_display} cannot carry a path"));
            }
        }
        self
    }

    /// Attaches versioned query parameters from a typed options struct.
    pub fn versioned_params<T: Serialize>(mut self, params: &T) -> Self {
        match serde_urlencoded::to_string(params) {
            Ok(query) if query.is_empty() => {}
            Ok(query) => self.url.set_query(Some(&query)),
            Err(err) => {
                self.build_error = Some(format!("failed to encode query parameters: {err}"));
            }
        }
        self
    }

    pub fn body(mut self, bytes: Vec<u8>) -> Self {
        self.body = Some(bytes);
        if self.content_type.is_none() {
            self.content_type = Some("application/json");
        }
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Marks the request as unbuildable; `stream` will fail without I/O.
    pub fn fail(mut self, reason: String) -> Self {
        self.build_error = Some(reason);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends the request and hands back the response with its body still
    /// unread. Connect-level failures are retried up to `max_retries`;
    /// non-success statuses are not.
    pub async fn stream(self) -> Result<reqwest::Response, RequestError> {
        if let Some(reason) = self.build_error {
            return Err(RequestError::Build(reason));
        }

        let mut attempt: u32 = 0;
        loop {
            let mut request = self
                .http
                .request(self.method.clone(), self.url.clone())
                .timeout(self.timeout);
            if let Some(content_type) = self.content_type {
                request = request.header(CONTENT_TYPE, content_type);
            }
            if let Some(body) = &self.body {
                request = request.body(body.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(RequestError::Status {
                            status,
                            url: self.url.to_string(),
                        });
                    }
                    return Ok(response);
                }
                Err(err) if err.is_connect() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(url = %self.url, attempt, "retrying after connect failure: {err}");
                }
                Err(err) => return Err(RequestError::Transport(err)),
            }
        }
    }
}
