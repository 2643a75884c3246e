//! Error types for payload decoding and command parsing.

use thiserror::Error;

/// Hex payload could not be decoded into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The text has an odd number of hex digits.
    #[error("invalid hex payload: odd number of digits ({len})")]
    OddLength {
        /// Length of the rejected text.
        len: usize,
    },
    /// The text contains a character outside `[0-9a-fA-F]`.
    #[error("invalid hex payload: unexpected character {character:?} at index {index}")]
    InvalidCharacter {
        /// The offending character.
        character: char,
        /// Its position in the text.
        index: usize,
    },
}

/// An inbound client message could not be turned into a [`crate::Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The message has no string `action` field.
    #[error("unknown action")]
    MissingAction,
    /// The `action` is not one the bridge understands.
    #[error("unknown action")]
    UnknownAction(String),
    /// The action is known but its fields are missing or mistyped.
    #[error("invalid parameters for {action}: {reason}")]
    InvalidParams {
        /// The action being parsed.
        action: String,
        /// What was wrong with the fields.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_length_display() {
        let err = CodecError::OddLength { len: 3 };
        assert_eq!(err.to_string(), "invalid hex payload: odd number of digits (3)");
    }

    #[test]
    fn invalid_character_display() {
        let err = CodecError::InvalidCharacter {
            character: 'z',
            index: 2,
        };
        assert_eq!(
            err.to_string(),
            "invalid hex payload: unexpected character 'z' at index 2"
        );
    }

    #[test]
    fn unknown_and_missing_action_share_message() {
        assert_eq!(CommandError::MissingAction.to_string(), "unknown action");
        assert_eq!(
            CommandError::UnknownAction("frobnicate".into()).to_string(),
            "unknown action"
        );
    }

    #[test]
    fn invalid_params_display() {
        let err = CommandError::InvalidParams {
            action: "open".into(),
            reason: "missing field `path`".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid parameters for open: missing field `path`"
        );
    }
}
