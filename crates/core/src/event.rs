//! Events emitted by the detector and delivered to the backend.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque bin identifier, forwarded on every event.
///
/// The backend keys bins by integer, but any string is accepted and passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinId {
    Number(i64),
    Text(String),
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinId::Number(n) => write!(f, "{n}"),
            BinId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for BinId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(n) => BinId::Number(n),
            Err(_) => BinId::Text(s.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Current distance, reported on every sample.
    FillLevel,
    /// Debounced "distance below threshold".
    BinFull,
    /// Confirmed drop-then-stabilize pattern.
    Deposit,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FillLevel => "fill_level",
            EventKind::BinFull => "bin_full",
            EventKind::Deposit => "deposit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JPEG-encoded image bytes captured at deposit confirmation.
#[derive(Clone, PartialEq, Eq)]
pub struct JpegImage(Bytes);

impl JpegImage {
    /// Start-of-image marker every JPEG stream begins with.
    pub const SOI: [u8; 2] = [0xFF, 0xD8];

    /// Wrap camera output, returning `None` unless it starts with the JPEG
    /// start-of-image marker.
    pub fn parse(bytes: impl Into<Bytes>) -> Option<Self> {
        let bytes = bytes.into();
        bytes.starts_with(&Self::SOI).then_some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for JpegImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JpegImage({} bytes)", self.0.len())
    }
}

/// A classified event, immutable once constructed.
///
/// Serializes to the backend's `/api/bin-event` JSON body. The image is
/// never part of the JSON; sinks attach it separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinEvent {
    pub bin_id: BinId,
    pub event_type: EventKind,
    pub distance_cm: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub image: Option<JpegImage>,
}

impl BinEvent {
    pub fn new(
        bin_id: BinId,
        event_type: EventKind,
        distance_cm: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            bin_id,
            event_type,
            distance_cm,
            timestamp,
            image: None,
        }
    }

    /// Attach a captured image. Only meaningful for deposit events.
    pub fn with_image(mut self, image: JpegImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}
