//! Input validation for IPC request parameters.
//!
//! Payloads arriving over the socket are untrusted; each request is checked
//! here before it reaches a handler. Limits are generous (audio and image
//! payloads ride the request channel as base64 data) but bounded.

/// Maximum length of an API key.
pub const MAX_API_KEY_LEN: usize = 512;

/// Maximum length of a profile or language tag.
pub const MAX_TAG_LEN: usize = 64;

/// Maximum length of a custom prompt or outbound text message.
pub const MAX_TEXT_LEN: usize = 64 * 1024;

/// Maximum length of a base64 media payload (audio chunk or image frame).
pub const MAX_MEDIA_LEN: usize = 8 * 1024 * 1024;

/// Maximum length of a transcription data URI.
pub const MAX_DATA_URI_LEN: usize = 12 * 1024 * 1024;

/// Maximum length of an exported transcript.
pub const MAX_TRANSCRIPT_LEN: usize = 4 * 1024 * 1024;

/// Validation error types.
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// A required string field is empty (or whitespace-only).
    EmptyField { field: &'static str },
    /// String field exceeds its maximum length.
    StringTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    /// The audio payload is not a `data:<mime>;base64,<payload>` URI.
    MalformedDataUri,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyField { field } => write!(f, "{} must not be empty", field),
            ValidationError::StringTooLong { field, len, max } => {
                write!(f, "{} too long: {} chars (max {})", field, len, max)
            }
            ValidationError::MalformedDataUri => write!(f, "invalid audio data URI format"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a required, bounded string field.
pub fn validate_non_empty(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    if value.len() > max {
        return Err(ValidationError::StringTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

/// Validate an optional, bounded string field (empty is fine).
pub fn validate_bounded(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.len() > max {
        return Err(ValidationError::StringTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

/// Validate the structure of a transcription data URI.
///
/// Accepts `data:<mime>;base64,<payload>` with a non-empty payload. The
/// payload itself is only decoded by the transcription orchestrator; this
/// check is purely structural so malformed requests are rejected before any
/// file is touched.
pub fn validate_data_uri(uri: &str) -> Result<(), ValidationError> {
    if uri.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "audio data",
        });
    }
    if uri.len() > MAX_DATA_URI_LEN {
        return Err(ValidationError::StringTooLong {
            field: "audio data",
            len: uri.len(),
            max: MAX_DATA_URI_LEN,
        });
    }
    match uri.split_once(',') {
        Some((header, payload)) if !payload.is_empty() => {
            if !header.starts_with("data:") || !header.ends_with(";base64") {
                return Err(ValidationError::MalformedDataUri);
            }
            Ok(())
        }
        _ => Err(ValidationError::MalformedDataUri),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_is_rejected() {
        assert!(validate_non_empty("text", "", MAX_TEXT_LEN).is_err());
        assert!(validate_non_empty("text", "   ", MAX_TEXT_LEN).is_err());
        assert!(validate_non_empty("text", "hello", MAX_TEXT_LEN).is_ok());
    }

    #[test]
    fn oversized_field_is_rejected() {
        let long = "x".repeat(MAX_TAG_LEN + 1);
        assert!(validate_non_empty("profile", &long, MAX_TAG_LEN).is_err());
        assert!(validate_bounded("prompt", &long, MAX_TEXT_LEN).is_ok());
    }

    #[test]
    fn well_formed_data_uri_is_accepted() {
        assert!(validate_data_uri("data:audio/webm;base64,AAAA").is_ok());
        assert!(validate_data_uri("data:audio/ogg;base64,UklGRg==").is_ok());
    }

    #[test]
    fn malformed_data_uri_is_rejected() {
        assert!(validate_data_uri("").is_err());
        assert!(validate_data_uri("AAAA").is_err());
        assert!(validate_data_uri("data:audio/webm;base64,").is_err());
        assert!(validate_data_uri("audio/webm;base64,AAAA").is_err());
        assert!(validate_data_uri("data:audio/webm,AAAA").is_err());
    }
}
