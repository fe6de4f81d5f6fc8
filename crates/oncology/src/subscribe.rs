//! WebSocket subscription to unsolicited oncology updates.
//!
//! The oncology system pushes whole `MedicationRequest` resources over a
//! long-lived socket. Each message becomes an [`OncologyEvent`]: a cancelled
//! resource is surfaced as [`OncologyEvent::Cancelled`], everything else as an
//! upsert. Messages that are not medication requests, or do not parse, are
//! logged and dropped — one bad message must not kill the stream.
//!
//! The loop ends when the cancellation token fires, the receiver goes away,
//! or the socket closes. There is no reconnection here; the caller decides
//! whether a dropped stream is worth re-establishing.

use crate::OncologyResult;
use fhir::{MedicationRequest, MedicationRequestData};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// An event delivered by the oncology update stream.
#[derive(Clone, Debug, PartialEq)]
pub enum OncologyEvent {
    /// A new or changed medication request; apply as an upsert by id.
    Upsert(MedicationRequestData),
    /// The oncology system cancelled this prescription.
    Cancelled { id: String },
}

/// Connect to the update stream and forward events until cancelled.
///
/// # Errors
///
/// Returns the connection error if the socket cannot be established, or the
/// transport error that ended an established stream. A clean close and a
/// cancellation both return `Ok(())`.
pub async fn subscribe(
    updates_url: &str,
    events: mpsc::Sender<OncologyEvent>,
    cancel: CancellationToken,
) -> OncologyResult<()> {
    let (mut stream, _) = connect_async(updates_url).await?;
    tracing::info!(url = updates_url, "subscribed to oncology updates");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("oncology subscription cancelled");
                return Ok(());
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = route_message(&text) {
                            if events.send(event).await.is_err() {
                                // Receiver gone; nothing left to deliver to.
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::warn!("oncology update stream closed");
                        return Ok(());
                    }
                    Some(Ok(_)) => {
                        // Ping/pong/binary frames carry no events.
                    }
                    Some(Err(err)) => {
                        tracing::error!(error = %err, "oncology update stream failed");
                        return Err(err.into());
                    }
                }
            }
        }
    }
}

/// Turn one socket message into an event, if it is one.
///
/// Returns `None` for non-JSON payloads, resources of other types, and
/// resources that fail to parse; each case is logged at an appropriate level.
fn route_message(text: &str) -> Option<OncologyEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "dropping non-JSON update message");
            return None;
        }
    };

    if value.get("resourceType").and_then(|v| v.as_str()) != Some("MedicationRequest") {
        return None;
    }

    if value.get("status").and_then(|v| v.as_str()) == Some("cancelled") {
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .or_else(|| {
                value
                    .pointer("/identifier/0/value")
                    .and_then(|v| v.as_str())
            })?
            .to_string();
        return Some(OncologyEvent::Cancelled { id });
    }

    match MedicationRequest::parse(text) {
        Ok(data) => Some(OncologyEvent::Upsert(data)),
        Err(err) => {
            tracing::warn!(error = %err, "dropping unparseable medication request");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::PrescriptionStatus;

    #[test]
    fn routes_update_messages_to_upsert() {
        let event = route_message(
            r#"{
                "resourceType": "MedicationRequest",
                "id": "RX12345",
                "status": "active",
                "subject": {"display": "Sarah Johnson"}
            }"#,
        )
        .expect("event");

        match event {
            OncologyEvent::Upsert(data) => {
                assert_eq!(data.id, "RX12345");
                assert_eq!(data.status, PrescriptionStatus::Processing);
                assert_eq!(data.patient_name, "Sarah Johnson");
            }
            other => panic!("expected upsert, got {other:?}"),
        }
    }

    #[test]
    fn routes_cancelled_status_to_cancellation() {
        let event = route_message(
            r#"{"resourceType": "MedicationRequest", "id": "RX12345", "status": "cancelled"}"#,
        )
        .expect("event");
        assert_eq!(
            event,
            OncologyEvent::Cancelled {
                id: "RX12345".to_string()
            }
        );
    }

    #[test]
    fn cancellation_falls_back_to_identifier_value() {
        let event = route_message(
            r#"{
                "resourceType": "MedicationRequest",
                "identifier": [{"value": "RX12346"}],
                "status": "cancelled"
            }"#,
        )
        .expect("event");
        assert_eq!(
            event,
            OncologyEvent::Cancelled {
                id: "RX12346".to_string()
            }
        );
    }

    #[test]
    fn ignores_other_resource_types_and_bad_payloads() {
        assert!(route_message(r#"{"resourceType": "Patient", "id": "P1"}"#).is_none());
        assert!(route_message("not json at all").is_none());
        // Cancelled but with no id anywhere: nothing to act on.
        assert!(
            route_message(r#"{"resourceType": "MedicationRequest", "status": "cancelled"}"#)
                .is_none()
        );
    }
}
