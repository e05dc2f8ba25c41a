use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use regex::Regex;

use cqms_types::api::QueryForm;

use crate::error::ValidationError;

/// 5 MB cap on decoded screenshots
pub const MAX_ATTACHMENT_SIZE: usize = 5 * 1024 * 1024;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("email pattern is valid"));

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checks the add/detail form and returns it with surrounding whitespace
/// stripped. Emptiness is reported before email shape.
pub fn validate_form(form: &QueryForm) -> Result<QueryForm, ValidationError> {
    let trimmed = QueryForm {
        email: form.email.trim().to_string(),
        mobile: form.mobile.trim().to_string(),
        heading: form.heading.trim().to_string(),
        description: form.description.trim().to_string(),
    };

    if trimmed.email.is_empty()
        || trimmed.mobile.is_empty()
        || trimmed.heading.is_empty()
        || trimmed.description.is_empty()
    {
        return Err(ValidationError::MissingFields);
    }

    if !is_valid_email(&trimmed.email) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(trimmed)
}

/// Decodes an optional base64 screenshot. Empty input means no attachment.
pub fn decode_attachment(encoded: Option<&str>) -> Result<Option<Vec<u8>>, ValidationError> {
    let Some(encoded) = encoded.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    // Reject before decoding when the encoded form alone is over the limit.
    if encoded.len() / 4 * 3 > MAX_ATTACHMENT_SIZE + 3 {
        return Err(ValidationError::AttachmentTooLarge {
            max: MAX_ATTACHMENT_SIZE,
        });
    }

    let bytes = B64.decode(encoded).map_err(|_| ValidationError::AttachmentEncoding)?;
    if bytes.len() > MAX_ATTACHMENT_SIZE {
        return Err(ValidationError::AttachmentTooLarge {
            max: MAX_ATTACHMENT_SIZE,
        });
    }
    if !bytes.starts_with(PNG_MAGIC) && !bytes.starts_with(JPEG_MAGIC) {
        return Err(ValidationError::AttachmentType);
    }

    Ok(Some(bytes))
}

/// Content type for a stored screenshot, sniffed from its first bytes.
pub fn attachment_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(PNG_MAGIC) {
        "image/png"
    } else if bytes.starts_with(JPEG_MAGIC) {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}
