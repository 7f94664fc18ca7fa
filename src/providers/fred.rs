// =============================================================================
// FRED Client — Federal Reserve Economic Data series observations
// =============================================================================
//
// SECURITY: the API key travels as a query parameter (FRED has no header
// auth) and is never logged or serialised.
//
// Observations are requested newest first so `limit` keeps the most recent
// values, then reversed to oldest first. FRED marks missing observations
// with "."; those are skipped.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{EconomicDataSource, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    value: String,
}

#[derive(Clone)]
pub struct FredClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl FredClient {
    /// A client without a key is valid but every request fails with
    /// `MissingCredentials`.
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        let base_url = base_url.into();
        debug!(base_url = %base_url, has_key = api_key.is_some(), "FredClient initialised");
        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url,
            client,
        })
    }

    /// GET /series/observations, oldest first.
    #[instrument(skip(self), name = "fred::get_observations")]
    pub async fn get_observations(
        &self,
        series_id: &str,
        limit: usize,
    ) -> Result<Vec<f64>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials("FRED_API_KEY"))?;

        let url = format!("{}/series/observations", self.base_url);
        let limit = limit.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                endpoint: format!("GET /series/observations ({series_id})"),
                status: status.as_u16(),
                body,
            });
        }

        let values = parse_observations(series_id, &body)?;
        debug!(series_id, count = values.len(), "observations fetched");
        Ok(values)
    }
}

impl std::fmt::Debug for FredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FredClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl EconomicDataSource for FredClient {
    async fn series(&self, series_id: &str, limit: usize) -> Result<Vec<f64>, ProviderError> {
        self.get_observations(series_id, limit).await
    }
}

/// Parse a newest-first observations payload into oldest-first values.
pub(crate) fn parse_observations(series_id: &str, body: &str) -> Result<Vec<f64>, ProviderError> {
    let parsed: ObservationsResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::decode(format!("{series_id} observations"), e))?;

    let mut values = Vec::with_capacity(parsed.observations.len());
    for obs in parsed.observations.iter().rev() {
        if obs.value == "." {
            continue;
        }
        let v = obs.value.parse::<f64>().map_err(|e| {
            ProviderError::decode(format!("{series_id} observation"), format!("'{}': {e}", obs.value))
        })?;
        values.push(v);
    }

    if values.is_empty() {
        return Err(ProviderError::Empty(series_id.to_string()));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverses_and_skips_missing() {
        let body = r#"{
            "observations": [
                {"date": "2024-03-06", "value": "7520000"},
                {"date": "2024-02-28", "value": "."},
                {"date": "2024-02-21", "value": "7610000.5"}
            ]
        }"#;
        let values = parse_observations("WALCL", body).unwrap();
        assert_eq!(values, vec![7610000.5, 7520000.0]);
    }

    #[test]
    fn all_missing_is_empty() {
        let body = r#"{"observations": [{"date": "2024-01-01", "value": "."}]}"#;
        assert!(matches!(
            parse_observations("RRPONTSYD", body),
            Err(ProviderError::Empty(id)) if id == "RRPONTSYD"
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_observations("X", "<html>"),
            Err(ProviderError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = FredClient::new(Some("  ".into()), "http://127.0.0.1:9").unwrap();
        let err = client.series("WALCL", 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentials(_)));
        assert!(format!("{client:?}").contains("api_key: None"));
    }
}
