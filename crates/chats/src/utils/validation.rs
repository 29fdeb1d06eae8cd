//! Validation utilities.

use crate::types::MessageError;

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate message body against the configured maximum length (in characters)
    pub fn message_body(body: &str, max_length: usize) -> Result<(), MessageError> {
        if body.trim().is_empty() {
            return Err(MessageError::EmptyBody);
        }

        let length = body.chars().count();
        if length > max_length {
            return Err(MessageError::BodyTooLong {
                length,
                max: max_length,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_validation() {
        assert!(Validator::message_body("hello", 10).is_ok());
        assert_eq!(
            Validator::message_body("   \n", 10),
            Err(MessageError::EmptyBody)
        );
        assert_eq!(
            Validator::message_body("hello world", 5),
            Err(MessageError::BodyTooLong { length: 11, max: 5 })
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(Validator::message_body("héllo", 5).is_ok());
    }
}
