//! Field validation shared by all records.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed length of every invitation code.
pub const INVITATION_CODE_LEN: usize = 10;

static INVITATION_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{10}$").expect("valid invitation code regex"));

/// Validation failure for a record that is about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// A required text field is blank after trimming.
    BlankField(&'static str),
    /// Phase end is earlier than its start.
    PhaseEndsBeforeStart { start_at: i64, end_at: i64 },
    /// Invitation code does not match the fixed `[A-Z0-9]{10}` shape.
    InvalidInvitationCode(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::PhaseEndsBeforeStart { start_at, end_at } => write!(
                f,
                "phase end {end_at} is earlier than phase start {start_at}"
            ),
            Self::InvalidInvitationCode(code) => write!(
                f,
                "invitation code `{code}` must be {INVITATION_CODE_LEN} characters of A-Z or 0-9"
            ),
        }
    }
}

impl Error for ModelValidationError {}

/// Rejects values that are empty after trimming.
pub fn require_text(field: &'static str, value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField(field));
    }
    Ok(())
}

/// Normalizes user-entered invitation codes (trim + uppercase) and checks
/// their shape.
pub fn normalize_invitation_code(raw: &str) -> Result<String, ModelValidationError> {
    let normalized = raw.trim().to_ascii_uppercase();
    validate_invitation_code(&normalized)?;
    Ok(normalized)
}

/// Checks an already normalized invitation code.
pub fn validate_invitation_code(code: &str) -> Result<(), ModelValidationError> {
    if !INVITATION_CODE_RE.is_match(code) {
        return Err(ModelValidationError::InvalidInvitationCode(code.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{normalize_invitation_code, require_text, ModelValidationError};

    #[test]
    fn require_text_rejects_whitespace() {
        assert_eq!(
            require_text("name", "  \t"),
            Err(ModelValidationError::BlankField("name"))
        );
        assert!(require_text("name", " Launch ").is_ok());
    }

    #[test]
    fn invitation_code_is_trimmed_and_uppercased() {
        assert_eq!(
            normalize_invitation_code("  ab12cd34ef ").unwrap(),
            "AB12CD34EF"
        );
    }

    #[test]
    fn invitation_code_rejects_wrong_length_and_symbols() {
        assert!(matches!(
            normalize_invitation_code("ABC"),
            Err(ModelValidationError::InvalidInvitationCode(_))
        ));
        assert!(matches!(
            normalize_invitation_code("AB12-D34EF"),
            Err(ModelValidationError::InvalidInvitationCode(_))
        ));
    }
}
