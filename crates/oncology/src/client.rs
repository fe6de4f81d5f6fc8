//! HTTP client for the oncology FHIR endpoint.

use crate::{OncologyConfig, OncologyError, OncologyResult};
use fhir::{MedicationRequest, MedicationRequestData, PrescriptionStatus};

const FHIR_CONTENT_TYPE: &str = "application/fhir+json";

/// Client for the oncology system's `MedicationRequest` endpoint.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct OncologyClient {
    http: reqwest::Client,
    config: OncologyConfig,
}

impl OncologyClient {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: OncologyConfig) -> OncologyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url(), path.trim_start_matches('/'))
    }

    /// Fetch every medication request the oncology system holds for this
    /// pharmacy.
    ///
    /// # Errors
    ///
    /// Fails on transport errors (including timeout), a non-2xx response, or
    /// a body that is not a parseable Bundle. No retry is attempted.
    pub async fn sync_prescriptions(&self) -> OncologyResult<Vec<MedicationRequestData>> {
        let url = self.endpoint("MedicationRequest");
        tracing::debug!(%url, "syncing prescriptions");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.config.api_token())
            .header(reqwest::header::ACCEPT, FHIR_CONTENT_TYPE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "sync rejected by oncology system");
            return Err(OncologyError::UnexpectedStatus(status));
        }

        let body = response.text().await?;
        Ok(MedicationRequest::parse_bundle(&body)?)
    }

    /// Push a status change for one prescription and return the resource the
    /// oncology system echoes back.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a non-2xx response, or an unparseable echo.
    /// The caller's local state is its own concern; this method does not
    /// undo anything on failure.
    pub async fn push_status(
        &self,
        prescription_id: &str,
        status: PrescriptionStatus,
        notes: Option<&str>,
    ) -> OncologyResult<MedicationRequestData> {
        let url = self.endpoint(&format!("MedicationRequest/{prescription_id}"));
        let body = MedicationRequest::render_status_update(prescription_id, status, notes)?;

        tracing::debug!(%url, status = %status, "pushing status update");

        let response = self
            .http
            .put(&url)
            .bearer_auth(self.config.api_token())
            .header(reqwest::header::CONTENT_TYPE, FHIR_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let http_status = response.status();
        if !http_status.is_success() {
            tracing::warn!(%url, status = %http_status, "status push rejected");
            return Err(OncologyError::UnexpectedStatus(http_status));
        }

        let echoed = response.text().await?;
        Ok(MedicationRequest::parse(&echoed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_REQUEST_TIMEOUT;

    fn client() -> OncologyClient {
        let config = OncologyConfig::new(
            "https://oncology-api.example.com/fhir/",
            "token",
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        OncologyClient::new(config).unwrap()
    }

    #[test]
    fn endpoints_join_cleanly() {
        let client = client();
        assert_eq!(
            client.endpoint("MedicationRequest"),
            "https://oncology-api.example.com/fhir/MedicationRequest"
        );
        assert_eq!(
            client.endpoint("/MedicationRequest/RX12345"),
            "https://oncology-api.example.com/fhir/MedicationRequest/RX12345"
        );
    }
}
