// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use cropcast_app::{
    CascadeField, LookupOutcome, LookupRequest, LookupScope, PredictionFormInput,
    PredictionOutcome, format_iso_date,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// Message shown when the service rejects a prediction without saying why.
pub const PREDICTION_FAILED: &str = "Prediction failed";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("cannot reach {base_url} ({source})")]
    Transport {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{}", service_error_text(*status, detail.as_deref()))]
    Service {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Best available message for the person filling in the form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { source, .. } => source.to_string(),
            Self::Service {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Service { detail: None, .. } => PREDICTION_FAILED.to_owned(),
            Self::Decode { .. } => self.to_string(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn service_error_text(status: StatusCode, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("service error ({}): {}", status.as_u16(), detail),
        None => format!("service returned {}", status.as_u16()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub prediction: f64,
    pub fallback_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub model_info: Option<Value>,
}

/// Blocking client for the catalog and estimation service.
///
/// `timeout` bounds catalog lookups, health and metadata calls. Predictions go
/// through a separate connection pool with no timeout and wait for the model.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
    predict_http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("service base URL must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("service base URL {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "service base URL {base_url:?} must use http or https, got {}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        let predict_http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("build prediction HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
            predict_http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Lists the candidate values for `field`, filtered by the ancestor `scope`.
    ///
    /// A body that is not a JSON array is an empty list; non-string elements
    /// are skipped.
    pub fn list_options(
        &self,
        field: CascadeField,
        scope: &LookupScope,
    ) -> Result<Vec<String>, ApiError> {
        let query: Vec<(&str, &str)> = scope.query_pairs().collect();
        let response = self
            .http
            .get(self.url(field.endpoint()))
            .query(&query)
            .send()
            .map_err(|source| self.transport(source))?;

        let body = self.read_success(response)?;
        let value: Value = serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            what: "option list",
            source,
        })?;
        Ok(options_from_value(value))
    }

    pub fn list_regions(&self) -> Result<Vec<String>, ApiError> {
        self.list_options(CascadeField::FIRST, &LookupScope::default())
    }

    pub fn predict(&self, input: &PredictionFormInput) -> Result<Estimate, ApiError> {
        let request = PredictRequest::new(input);
        let response = self
            .predict_http
            .post(self.url("predict"))
            .json(&request)
            .send()
            .map_err(|source| self.transport(source))?;

        let body = self.read_success(response)?;
        let parsed: PredictResponse =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                what: "prediction response",
                source,
            })?;
        Ok(Estimate {
            prediction: parsed.prediction,
            fallback_used: parsed.fallback_used,
        })
    }

    pub fn health(&self) -> Result<Health, ApiError> {
        let response = self
            .http
            .get(self.url(""))
            .send()
            .map_err(|source| self.transport(source))?;
        let body = self.read_success(response)?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            what: "health response",
            source,
        })
    }

    pub fn metadata(&self) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(self.url("metadata"))
            .send()
            .map_err(|source| self.transport(source))?;
        let body = self.read_success(response)?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            what: "model metadata",
            source,
        })
    }

    /// Runs a cascade lookup and folds any failure into the outcome.
    pub fn fetch_lookup(&self, request: &LookupRequest) -> LookupOutcome {
        debug!(
            ticket = %request.ticket,
            endpoint = request.field.endpoint(),
            "fetching options"
        );
        match self.list_options(request.field, &request.scope) {
            Ok(options) => LookupOutcome::Options(options),
            Err(error) => {
                warn!(ticket = %request.ticket, endpoint = request.field.endpoint(), %error, "lookup failed");
                LookupOutcome::Failed(error.user_message())
            }
        }
    }

    pub fn fetch_prediction(&self, input: &PredictionFormInput) -> PredictionOutcome {
        match self.predict(input) {
            Ok(estimate) => PredictionOutcome::Estimate {
                prediction: estimate.prediction,
                fallback_used: estimate.fallback_used,
            },
            Err(error) => {
                error!(%error, "prediction failed");
                PredictionOutcome::Failed(error.user_message())
            }
        }
    }

    fn read_success(&self, response: Response) -> Result<String, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Service {
                status,
                detail: detail_from_body(&body),
            });
        }
        response.text().map_err(|source| self.transport(source))
    }

    fn transport(&self, source: reqwest::Error) -> ApiError {
        ApiError::Transport {
            base_url: self.base_url.clone(),
            source,
        }
    }
}

fn options_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn detail_from_body(body: &str) -> Option<String> {
    let parsed: ErrorEnvelope = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        Value::Null => None,
        Value::String(detail) if detail.trim().is_empty() => None,
        Value::String(detail) => Some(detail),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    state: &'a str,
    district: &'a str,
    market: &'a str,
    commodity: &'a str,
    variety: &'a str,
    grade: &'a str,
    date: String,
}

impl<'a> PredictRequest<'a> {
    fn new(input: &'a PredictionFormInput) -> Self {
        Self {
            state: &input.region,
            district: &input.subregion,
            market: &input.locality,
            commodity: &input.product,
            variety: &input.subtype,
            grade: &input.grade,
            date: format_iso_date(input.date),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    prediction: f64,
    #[serde(default)]
    fallback_used: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::{
        ApiError, Client, PREDICTION_FAILED, PredictRequest, detail_from_body, options_from_value,
    };
    use cropcast_app::{CascadeField, PredictionFormInput};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;
    use time::{Date, Month};

    #[test]
    fn non_array_bodies_become_empty_lists() {
        assert!(options_from_value(json!({"detail": "nope"})).is_empty());
        assert!(options_from_value(json!(null)).is_empty());
        assert_eq!(
            options_from_value(json!(["Goa", 3, "Kerala"])),
            vec!["Goa".to_owned(), "Kerala".to_owned()]
        );
    }

    #[test]
    fn detail_is_extracted_when_present() {
        assert_eq!(
            detail_from_body(r#"{"detail":"no data"}"#),
            Some("no data".to_owned())
        );
        assert_eq!(detail_from_body(r#"{"detail":""}"#), None);
        assert_eq!(detail_from_body("Internal Server Error"), None);
        assert_eq!(
            detail_from_body(r#"{"detail":[{"msg":"field required"}]}"#),
            Some(r#"[{"msg":"field required"}]"#.to_owned())
        );
    }

    #[test]
    fn user_message_prefers_detail_then_generic_text() {
        let with_detail = ApiError::Service {
            status: StatusCode::BAD_REQUEST,
            detail: Some("no data".to_owned()),
        };
        assert_eq!(with_detail.user_message(), "no data");
        assert_eq!(with_detail.to_string(), "service error (400): no data");

        let bare = ApiError::Service {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: None,
        };
        assert_eq!(bare.user_message(), PREDICTION_FAILED);
        assert_eq!(bare.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn predict_request_uses_service_field_names() {
        let input = PredictionFormInput {
            region: "Kerala".to_owned(),
            subregion: "Idukki".to_owned(),
            locality: "Kattappana".to_owned(),
            product: "Cardamom".to_owned(),
            subtype: "Small".to_owned(),
            grade: "FAQ".to_owned(),
            date: Date::from_calendar_date(2026, Month::July, 9).expect("valid date"),
        };
        let body = serde_json::to_value(PredictRequest::new(&input)).expect("serialize request");
        assert_eq!(
            body,
            json!({
                "state": "Kerala",
                "district": "Idukki",
                "market": "Kattappana",
                "commodity": "Cardamom",
                "variety": "Small",
                "grade": "FAQ",
                "date": "2026-07-09",
            })
        );
        for field in CascadeField::ALL {
            assert!(body.get(field.param()).is_some());
        }
    }

    #[test]
    fn new_rejects_empty_and_non_http_urls() {
        assert!(Client::new("  ", Duration::from_secs(1)).is_err());
        assert!(Client::new("ftp://prices.example", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn new_trims_trailing_slashes() {
        let client = Client::new("http://127.0.0.1:8000///", Duration::from_secs(1))
            .expect("client should initialize");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
        assert_eq!(client.timeout(), Duration::from_secs(1));
    }
}
