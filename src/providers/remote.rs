//! Blocking client for a remote scoring collaborator.
//!
//! The remote service accepts `{"image": <base64 JPEG>, "text": <string>}`
//! and answers with a status envelope carrying the prediction, the full
//! category score map, and the keywords it extracted. Responses outside the
//! fixed category label set are protocol violations, never defaults. The
//! client carries a 30 second timeout and never retries.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{Category, CategoryScore, PredictionResult};

/// Request/response timeout for one scoring call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by [`RemoteScorer`].
#[derive(Debug, Error)]
pub enum RemoteScoringError {
    #[error("failed to build HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),
    #[error("request to scoring service failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("scoring service returned HTTP {status}")]
    Status { status: u16 },
    #[error("failed to decode scoring response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("scoring service reported an error: {message}")]
    Scoring { message: String },
    #[error("scoring response is missing required field \"{name}\"")]
    MissingField { name: &'static str },
    #[error("scoring response used unknown category label \"{label}\"")]
    UnknownLabel { label: String },
    #[error("scoring response omitted a score for category \"{label}\"")]
    MissingScore { label: &'static str },
}

/// A prediction returned by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteScore {
    /// The classification outcome in local types.
    pub prediction: PredictionResult,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    image: String,
    text: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    status: String,
    #[serde(default)]
    predicted_category: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    category_scores: Option<HashMap<String, f32>>,
    #[serde(default)]
    keywords: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the remote scoring endpoint.
#[derive(Debug, Clone)]
pub struct RemoteScorer {
    client: reqwest::blocking::Client,
    score_url: String,
    health_url: String,
    bearer_token: Option<String>,
}

impl RemoteScorer {
    /// Build a client for the scoring endpoint at `score_url`.
    ///
    /// The health probe defaults to the sibling `/health` path.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteScoringError::BuildClient`] when the underlying HTTP
    /// client cannot be constructed.
    pub fn new(score_url: impl Into<String>) -> Result<Self, RemoteScoringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RemoteScoringError::BuildClient)?;
        let score_url = score_url.into();
        let health_url = sibling_health_url(&score_url);
        Ok(Self {
            client,
            score_url,
            health_url,
            bearer_token: None,
        })
    }

    /// Attach a bearer token sent with every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Override the health probe URL.
    #[must_use]
    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = url.into();
        self
    }

    /// Score one product listing remotely.
    ///
    /// # Errors
    ///
    /// Returns transport errors, non-success HTTP statuses, service-reported
    /// errors, and protocol violations (unknown labels, missing fields).
    pub fn score(&self, image_bytes: &[u8], text: &str) -> Result<RemoteScore, RemoteScoringError> {
        let request = ScoreRequest {
            image: BASE64.encode(image_bytes),
            text,
        };
        let mut builder = self.client.post(&self.score_url).json(&request);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().map_err(RemoteScoringError::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteScoringError::Status {
                status: status.as_u16(),
            });
        }
        let body: ScoreResponse = response.json().map_err(RemoteScoringError::Decode)?;
        parse_score(body)
    }

    /// Probe the service's health endpoint.
    ///
    /// # Errors
    ///
    /// Returns transport errors and non-success HTTP statuses.
    pub fn health(&self) -> Result<(), RemoteScoringError> {
        let mut builder = self.client.get(&self.health_url);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().map_err(RemoteScoringError::Request)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteScoringError::Status {
                status: status.as_u16(),
            })
        }
    }
}

/// Replace the last path segment of `score_url` with `health`.
fn sibling_health_url(score_url: &str) -> String {
    let trimmed = score_url.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((base, _)) if base.contains("://") || base.contains('/') => format!("{base}/health"),
        _ => format!("{trimmed}/health"),
    }
}

/// Validate the response envelope and convert it into local types.
fn parse_score(body: ScoreResponse) -> Result<RemoteScore, RemoteScoringError> {
    if body.status != "success" {
        let message = body
            .error
            .unwrap_or_else(|| format!("status \"{}\"", body.status));
        return Err(RemoteScoringError::Scoring { message });
    }

    let label = body
        .predicted_category
        .ok_or(RemoteScoringError::MissingField {
            name: "predicted_category",
        })?;
    let predicted_category =
        Category::from_label(&label).ok_or(RemoteScoringError::UnknownLabel { label })?;
    let confidence = body.confidence.ok_or(RemoteScoringError::MissingField {
        name: "confidence",
    })?;
    let scores = body
        .category_scores
        .ok_or(RemoteScoringError::MissingField {
            name: "category_scores",
        })?;

    for label in scores.keys() {
        if Category::from_label(label).is_none() {
            return Err(RemoteScoringError::UnknownLabel {
                label: label.clone(),
            });
        }
    }
    let category_scores = Category::ALL
        .into_iter()
        .map(|category| {
            scores
                .get(category.label())
                .map(|score| CategoryScore {
                    category,
                    score: *score,
                })
                .ok_or(RemoteScoringError::MissingScore {
                    label: category.label(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RemoteScore {
        prediction: PredictionResult {
            predicted_category,
            confidence,
            category_scores,
            keywords: body.keywords.unwrap_or_default(),
        },
    })
}
