// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON-over-HTTP access to upstream systems, with retries

use crate::error::UpstreamError;
use crate::SourceError;
use http::HeaderMap;
use http::Method;
use http::StatusCode;
use reqwest::Url;
use serde::de::DeserializeOwned;
use slog::debug;
use slog::warn;
use ssot_common::InlineErrorChain;
use slog::Logger;
use ssot_common::backoff::retry_with_limit;
use ssot_common::backoff::upstream_policy;
use ssot_common::backoff::BackoffError;
use ssot_common::backoff::UPSTREAM_MAX_ATTEMPTS;
use ssot_config::SourceConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct UpstreamClient {
    log: Logger,
    base: Url,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl UpstreamClient {
    /// Builds a client for the upstream of `config`, whose API lives under
    /// `api_root` (e.g. `/api2/json/`).
    pub fn new(
        log: &Logger,
        config: &SourceConfig,
        api_root: &str,
        headers: HeaderMap,
        cancel: CancellationToken,
    ) -> Result<UpstreamClient, SourceError> {
        let init = |message: String| SourceError::Init {
            source_name: config.name.clone(),
            message,
        };
        let base_url = format!("{}{}", config.base_url(), api_root);
        let base = Url::parse(&base_url)
            .map_err(|error| init(format!("url {base_url:?}: {error}")))?;

        let mut builder = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .user_agent(concat!("netbox-ssot/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!config.validate_cert);
        if let Some(ca_file) = &config.ca_file {
            let pem = std::fs::read(ca_file)
                .map_err(|error| init(format!("reading {ca_file}: {error}")))?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|error| init(format!("parsing {ca_file}: {error}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|error| init(format!("building http client: {error}")))?;
        Ok(UpstreamClient { log: log.clone(), base, client, cancel })
    }

    /// GETs `path` relative to the API root, retrying transient failures
    /// with the upstream backoff policy.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, UpstreamError> {
        let url = self.url(path)?;
        retry_with_limit(
            upstream_policy(),
            UPSTREAM_MAX_ATTEMPTS,
            || {
                let url = url.clone();
                async move {
                    self.get_once(url).await.map_err(|error| {
                        if error.is_transient() {
                            BackoffError::transient(error)
                        } else {
                            BackoffError::permanent(error)
                        }
                    })
                }
            },
            |error: UpstreamError, delay: Duration| {
                warn!(self.log, "upstream request failed, retrying";
                    "error" => InlineErrorChain::new(&error),
                    "delay_ms" => delay.as_millis(),
                );
            },
        )
        .await
    }

    /// GETs `path` once.  An error status yields `None`: used for optional
    /// data such as guest agent queries, which fail whenever the agent is
    /// not running.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, UpstreamError> {
        let url = self.url(path)?;
        match self.get_once(url).await {
            Ok(value) => Ok(Some(value)),
            Err(UpstreamError::Status { status, url, .. }) => {
                debug!(self.log, "optional upstream data unavailable";
                    "uri" => url,
                    "status" => status.as_u16(),
                );
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn url(&self, path: &str) -> Result<Url, UpstreamError> {
        self.base.join(path).map_err(|error| UpstreamError::Decode {
            method: Method::GET,
            url: path.to_owned(),
            message: format!("invalid path: {error}"),
        })
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, UpstreamError> {
        debug!(self.log, "upstream request"; "uri" => %url);
        let transport = |source| UpstreamError::Transport {
            method: Method::GET,
            url: url.to_string(),
            source,
        };
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(UpstreamError::Cancelled),
            response = self.client.get(url.clone()).send() => {
                response.map_err(transport)?
            }
        };
        let status = response.status();
        let bytes = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(UpstreamError::Cancelled),
            bytes = response.bytes() => bytes.map_err(transport)?,
        };
        debug!(self.log, "upstream response";
            "uri" => %url,
            "status" => status.as_u16(),
        );

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
        {
            return Err(UpstreamError::Auth {
                method: Method::GET,
                url: url.to_string(),
                status,
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                method: Method::GET,
                url: url.to_string(),
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice(&bytes).map_err(|error| UpstreamError::Decode {
            method: Method::GET,
            url: url.to_string(),
            message: error.to_string(),
        })
    }
}
