//! HTTP binding of [`DistributionService`] using reqwest with a cookie store,
//! so the visitor's session cookie is replayed on every call.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    error::{ApiError, RejectionReason},
    protocol::{CheckClaimResponse, ClaimRequest, ClaimResponse, CHECK_CLAIM_PATH, CLAIM_PATH},
};
use tracing::{debug, warn};
use url::Url;

use crate::{error::ServiceError, ClaimOutcome, DistributionService};

pub struct HttpDistributionService {
    http: Client,
    server_url: String,
}

impl HttpDistributionService {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let server_url = normalize_server_url(server_url)?;
        let http = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, server_url })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

/// Accepts absolute http(s) URLs and strips any trailing slash.
pub fn normalize_server_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let parsed = Url::parse(raw).with_context(|| format!("invalid server url '{raw}'"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(anyhow!(
                "server url must use http or https, got '{other}://' in '{raw}'"
            ))
        }
    }
    if parsed.host_str().is_none() {
        return Err(anyhow!("server url '{raw}' has no host"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn rejection_fallback(status: reqwest::StatusCode) -> String {
    format!("Claim failed (HTTP {}). Please try again.", status.as_u16())
}

#[async_trait]
impl DistributionService for HttpDistributionService {
    async fn check_claim(&self) -> Result<CheckClaimResponse, ServiceError> {
        let response = self
            .http
            .get(format!("{}{CHECK_CLAIM_PATH}", self.server_url))
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                path: CHECK_CLAIM_PATH,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                path: CHECK_CLAIM_PATH,
                status,
            });
        }

        response
            .json::<CheckClaimResponse>()
            .await
            .map_err(|source| ServiceError::Decode {
                path: CHECK_CLAIM_PATH,
                source,
            })
    }

    async fn claim(&self) -> Result<ClaimOutcome, ServiceError> {
        let response = self
            .http
            .post(format!("{}{CLAIM_PATH}", self.server_url))
            .json(&ClaimRequest::default())
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                path: CLAIM_PATH,
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            let body: ClaimResponse =
                response.json().await.map_err(|source| ServiceError::Decode {
                    path: CLAIM_PATH,
                    source,
                })?;
            return Ok(ClaimOutcome::Granted {
                coupon: body.coupon,
                message: body.message,
            });
        }

        let body = match response.json::<ApiError>().await {
            Ok(body) => body,
            Err(err) => {
                warn!(status = status.as_u16(), error = %err, "claim: rejection without a JSON payload");
                ApiError::default()
            }
        };
        debug!(status = status.as_u16(), ?body, "claim: rejected by service");

        Ok(match body.reason() {
            RejectionReason::AlreadyClaimed { coupon, message } => {
                ClaimOutcome::AlreadyClaimed { coupon, message }
            }
            RejectionReason::Other { message } => ClaimOutcome::Rejected { message },
            RejectionReason::Unspecified => ClaimOutcome::Rejected {
                message: rejection_fallback(status),
            },
        })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
