//! Media references and their locators (template clips, user media, songs).
//!
//! A [`MediaReference`] is what the user selected. Its [`Locator`] says
//! where the bytes live:
//!
//! - `blob:<id>` -- an ephemeral upload held by the current process only;
//! - `data:<mime>;base64,<payload>` -- an inline, self-contained payload;
//! - anything else -- a key into durable object storage.
//!
//! Only inline references may be placed into a job spec.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Locator prefix for ephemeral, process-local upload handles.
pub const EPHEMERAL_PREFIX: &str = "blob:";

/// Locator prefix for inline RFC 2397 data URLs.
pub const INLINE_PREFIX: &str = "data:";

/// Duration assumed for still images when none is given (seconds).
pub const DEFAULT_IMAGE_DURATION_SECS: f64 = 5.0;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Whether a media asset is a still image or a video clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Derive the kind from a MIME type: `video/*` is a video, anything
    /// else is treated as an image.
    pub fn from_mime(mime: &str) -> Self {
        if mime.trim().to_ascii_lowercase().starts_with("video/") {
            Self::Video
        } else {
            Self::Image
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Where the bytes of a media asset can be found.
///
/// Serialized as a plain string; the variant is recovered from the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locator {
    /// Process-local upload handle (`blob:...`). Does not survive restart.
    Ephemeral(String),
    /// Key into durable object storage.
    Storage(String),
    /// Inline data URL (`data:...`).
    Inline(String),
}

impl Locator {
    /// Classify a raw locator string by its prefix.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::Validation("media locator must not be empty".into()));
        }
        if raw.starts_with(INLINE_PREFIX) {
            Ok(Self::Inline(raw.to_string()))
        } else if raw.starts_with(EPHEMERAL_PREFIX) {
            Ok(Self::Ephemeral(raw.to_string()))
        } else {
            Ok(Self::Storage(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ephemeral(s) | Self::Storage(s) | Self::Inline(s) => s,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

impl TryFrom<String> for Locator {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(value: Locator) -> Self {
        match value {
            Locator::Ephemeral(s) | Locator::Storage(s) | Locator::Inline(s) => s,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Inline payloads can be megabytes long; never print them whole.
            Self::Inline(s) => {
                let header = s.split(',').next().unwrap_or(s);
                write!(f, "{header},<{} bytes>", s.len())
            }
            Self::Ephemeral(s) | Self::Storage(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// DataUrl
// ---------------------------------------------------------------------------

/// A decoded `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Parse and decode a base64 data URL.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let rest = raw
            .strip_prefix(INLINE_PREFIX)
            .ok_or_else(|| CoreError::Validation("data URL must start with 'data:'".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| CoreError::Validation("data URL is missing its payload".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| CoreError::Validation("only base64 data URLs are supported".into()))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| CoreError::Validation(format!("invalid base64 payload: {e}")))?;

        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        Ok(Self::new(mime, bytes))
    }

    /// Encode as a data URL string.
    pub fn encode(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime)
    }
}

// ---------------------------------------------------------------------------
// MediaReference
// ---------------------------------------------------------------------------

/// A user-selected media asset, before or after resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub kind: MediaKind,
    pub locator: Locator,
    /// Clip length in seconds. Required for videos.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Width / height. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
}

impl MediaReference {
    pub fn new(kind: MediaKind, locator: Locator) -> Self {
        Self {
            kind,
            locator,
            duration_seconds: None,
            aspect_ratio: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Effective duration: the declared one, or the image default.
    pub fn duration_secs(&self) -> f64 {
        match (self.kind, self.duration_seconds) {
            (_, Some(secs)) => secs,
            (MediaKind::Image, None) => DEFAULT_IMAGE_DURATION_SECS,
            (MediaKind::Video, None) => 0.0,
        }
    }

    /// Check the per-kind requirements of the data model.
    pub fn validate(&self) -> Result<(), CoreError> {
        match (self.kind, self.duration_seconds) {
            (MediaKind::Video, None) => Err(CoreError::Validation(
                "durationSeconds is required for video media".into(),
            )),
            (_, Some(secs)) if !secs.is_finite() || secs <= 0.0 => Err(CoreError::Validation(
                format!("durationSeconds must be positive, got {secs}"),
            )),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
