// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP implementation of [`RegistryApi`]

use crate::api::ListFilter;
use crate::api::RegistryApi;
use crate::Error;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use http::header;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use http::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use slog::debug;
use slog::o;
use slog::Logger;
use ssot_types::ObjectKind;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Prefix of v2 API tokens, which are sent as bearer tokens.
const V2_TOKEN_PREFIX: &str = "nbt_";

/// How to reach and authenticate against the registry.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// `http` or `https`.
    pub scheme: String,
    pub hostname: String,
    pub port: u16,
    pub api_token: String,
    pub validate_cert: bool,
    /// PEM file with an additional root certificate.
    pub ca_file: Option<Utf8PathBuf>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/api/", self.scheme, self.hostname, self.port)
    }
}

/// One page of a list response.
#[derive(Deserialize)]
struct Page {
    next: Option<String>,
    results: Vec<Value>,
}

pub struct Client {
    log: Logger,
    base: Url,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl Client {
    /// Builds a client for the registry described by `config`.  Every
    /// request is abandoned as soon as `cancel` fires.
    pub fn new(
        log: &Logger,
        config: &ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Client, Error> {
        let base_url = config.base_url();
        let base = Url::parse(&base_url).map_err(|error| {
            Error::Config(format!("registry url {base_url:?}: {error}"))
        })?;

        let mut headers = HeaderMap::new();
        let authorization =
            if config.api_token.starts_with(V2_TOKEN_PREFIX) {
                format!("Bearer {}", config.api_token)
            } else {
                format!("Token {}", config.api_token)
            };
        let mut authorization = HeaderValue::from_str(&authorization)
            .map_err(|_| {
                Error::Config(String::from(
                    "api token contains invalid header characters",
                ))
            })?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);
        let json = HeaderValue::from_static("application/json");
        headers.insert(header::ACCEPT, json.clone());
        headers.insert(header::CONTENT_TYPE, json);

        let mut builder = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .user_agent(concat!("netbox-ssot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.validate_cert);
        if let Some(ca_file) = &config.ca_file {
            let pem = std::fs::read(ca_file).map_err(|error| {
                Error::Config(format!("reading {ca_file}: {error}"))
            })?;
            let certificate =
                reqwest::Certificate::from_pem(&pem).map_err(|error| {
                    Error::Config(format!("parsing {ca_file}: {error}"))
                })?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder.build().map_err(|error| {
            Error::Config(format!("building http client: {error}"))
        })?;

        let log = log.new(o!(
            "component" => "netbox-client",
            "registry" => base.to_string(),
        ));
        Ok(Client { log, base, client, cancel })
    }

    fn collection_url(&self, kind: ObjectKind) -> Result<Url, Error> {
        self.join(&format!("{}/", kind.api_path()))
    }

    fn record_url(&self, kind: ObjectKind, id: i64) -> Result<Url, Error> {
        self.join(&format!("{}/{}/", kind.api_path(), id))
    }

    fn join(&self, path: &str) -> Result<Url, Error> {
        self.base.join(path).map_err(|error| {
            Error::Config(format!("registry path {path:?}: {error}"))
        })
    }

    /// The registry builds `next` links from its own idea of its address,
    /// which behind a proxy may differ from ours.  Only the path and query of
    /// the link are used.
    fn rebase(&self, next: &str) -> Result<Url, Error> {
        let next = Url::parse(next).map_err(|error| Error::Decode {
            method: Method::GET,
            url: next.to_owned(),
            message: format!("invalid next link: {error}"),
        })?;
        let mut url = self.base.clone();
        url.set_path(next.path());
        url.set_query(next.query());
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Option<Value>, Error> {
        debug!(self.log, "client request";
            "method" => %method,
            "uri" => %url,
            "body" => ?body,
        );

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let transport = |source| Error::Transport {
            method: method.clone(),
            url: url.to_string(),
            source,
        };

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            response = request.send() => response.map_err(transport)?,
        };
        let status = response.status();
        let bytes = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            bytes = response.bytes() => bytes.map_err(transport)?,
        };
        debug!(self.log, "client response";
            "method" => %method,
            "uri" => %url,
            "status" => status.as_u16(),
        );

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
        {
            return Err(Error::Auth {
                method,
                url: url.to_string(),
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        if !status.is_success() {
            return Err(Error::Status {
                method,
                url: url.to_string(),
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes).map(Some).map_err(|error| {
            Error::Decode {
                method,
                url: url.to_string(),
                message: error.to_string(),
            }
        })
    }

    async fn send_for_body(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let display_url = url.to_string();
        self.send(method.clone(), url, body).await?.ok_or_else(|| {
            Error::Decode {
                method,
                url: display_url,
                message: String::from("empty response body"),
            }
        })
    }
}

#[async_trait]
impl RegistryApi for Client {
    async fn list(
        &self,
        kind: ObjectKind,
        filter: &ListFilter,
    ) -> Result<Vec<Value>, Error> {
        let mut url = self.collection_url(kind)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", "0");
            for (key, value) in filter.params() {
                query.append_pair(key, value);
            }
        }

        let mut records = Vec::new();
        loop {
            let body =
                self.send_for_body(Method::GET, url.clone(), None).await?;
            let page: Page =
                serde_json::from_value(body).map_err(|error| Error::Decode {
                    method: Method::GET,
                    url: url.to_string(),
                    message: error.to_string(),
                })?;
            records.extend(page.results);
            match page.next {
                Some(next) => url = self.rebase(&next)?,
                None => break,
            }
        }
        debug!(self.log, "listed records";
            "kind" => %kind,
            "count" => records.len(),
        );
        Ok(records)
    }

    async fn create(
        &self,
        kind: ObjectKind,
        body: &Value,
    ) -> Result<Value, Error> {
        let url = self.collection_url(kind)?;
        self.send_for_body(Method::POST, url, Some(body)).await
    }

    async fn patch(
        &self,
        kind: ObjectKind,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<Value, Error> {
        let url = self.record_url(kind, id)?;
        let body = Value::Object(body.clone());
        self.send_for_body(Method::PATCH, url, Some(&body)).await
    }

    async fn delete(&self, kind: ObjectKind, id: i64) -> Result<(), Error> {
        let url = self.record_url(kind, id)?;
        self.send(Method::DELETE, url, None).await.map(|_| ())
    }
}
