//! Event sinks: HTTP delivery to the backend, and a logging sink for dry runs.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use binbin_core::{BinEvent, EventKind};

use crate::traits::{DispatchError, EventSink};

/// Posts events to the backend's `/api/bin-event` route.
///
/// Events go out as JSON. A deposit carrying an image goes out as
/// `multipart/form-data` instead, with the same JSON in a `payload` part
/// and the JPEG in an `image` part. Every request is bounded by the
/// configured timeout; nothing is retried.
///
/// The backend must accept both encodings on that route. A backend that
/// only reads JSON bodies answers the multipart request with a 4xx, which
/// surfaces as [`DispatchError::Rejected`] for every deposit with an image.
/// Fill-level, full and image-less deposit events are plain JSON and work
/// against either.
#[derive(Debug)]
pub struct HttpEventSink {
    /// Full URL of the event route.
    endpoint: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl HttpEventSink {
    pub const EVENT_PATH: &'static str = "/api/bin-event";

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), Self::EVENT_PATH),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, event: &BinEvent) -> Result<reqwest::RequestBuilder, DispatchError> {
        let image = match (&event.event_type, &event.image) {
            (EventKind::Deposit, Some(image)) => image,
            _ => return Ok(self.client.post(&self.endpoint).json(event)),
        };

        let payload = serde_json::to_string(event)
            .map_err(|e| DispatchError::Encode(e.to_string()))?;
        let file_name = format!("deposit_{}.jpg", event.timestamp.format("%Y%m%d_%H%M%S"));
        let image_part = Part::bytes(image.as_bytes().to_vec())
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = Form::new().text("payload", payload).part("image", image_part);

        Ok(self.client.post(&self.endpoint).multipart(form))
    }
}

#[async_trait::async_trait]
impl EventSink for HttpEventSink {
    async fn send(&self, event: &BinEvent) -> Result<(), DispatchError> {
        let response = self.request(event)?.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(
                url = %self.endpoint,
                %status,
                body = %body,
                "backend returned non-2xx status"
            );
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            url = %self.endpoint,
            event_type = %event.event_type,
            status = %status,
            "event delivered"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "http"
    }
}

/// Logs events instead of delivering them. Always succeeds.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl EventSink for LogSink {
    async fn send(&self, event: &BinEvent) -> Result<(), DispatchError> {
        info!(
            bin_id = %event.bin_id,
            event_type = %event.event_type,
            distance_cm = event.distance_cm,
            timestamp = %event.timestamp,
            image_bytes = event.image.as_ref().map(|i| i.as_bytes().len()).unwrap_or(0),
            "event (dry run)"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
