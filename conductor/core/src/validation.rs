//! Input Validation
//!
//! Chat input is validated before anything touches the network. Failures are
//! resolved entirely client-side with a transient warning.

/// Result of input validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input is valid
    Valid,
    /// Input is invalid with reason
    Invalid(String),
}

impl ValidationResult {
    /// Check if the result indicates valid input
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Get the error message if invalid
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(msg) => Some(msg),
        }
    }
}

/// Validator for chat input
#[derive(Clone, Debug)]
pub struct InputValidator {
    max_message_bytes: usize,
}

impl InputValidator {
    /// Create a validator with the given size limit
    pub fn new(max_message_bytes: usize) -> Self {
        Self { max_message_bytes }
    }

    /// Validate a chat message
    pub fn validate_message(&self, content: &str) -> ValidationResult {
        if content.trim().is_empty() {
            return ValidationResult::Invalid("Please enter a message".to_string());
        }

        if content.len() > self.max_message_bytes {
            return ValidationResult::Invalid(format!(
                "Message too large: {} bytes (max: {})",
                content.len(),
                self.max_message_bytes
            ));
        }

        // Control characters other than whitespace never come from a keyboard
        if content
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
        {
            return ValidationResult::Invalid(
                "Message contains invalid control characters".to_string(),
            );
        }

        ValidationResult::Valid
    }
}
