//! Validation helpers for DTOs.

use serde::Serialize;
use serde_json::{Map, Value};
use validator::ValidationError;

use crate::state::game::SessionId;

/// Validates that a session ID is exactly 4 characters from `[A-Z0-9]`.
///
/// # Examples
///
/// ```ignore
/// validate_session_id("AB12") // Ok
/// validate_session_id("ab12") // Err - lowercase
/// validate_session_id("AB1")  // Err - too short
/// ```
pub fn validate_session_id(id: &str) -> Result<(), ValidationError> {
    if id.len() != SessionId::LEN {
        let mut err = ValidationError::new("session_id_length");
        err.message = Some(
            format!(
                "Session ID must be exactly {} characters (got {})",
                SessionId::LEN,
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !SessionId::is_valid(id) {
        let mut err = ValidationError::new("session_id_format");
        err.message =
            Some("Session ID must contain only uppercase letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Keys of `raw` that did not survive deserialisation into `typed`.
///
/// `typed` must serialise every one of its fields, so any key of the raw object
/// missing from the re-serialised form was ignored by the deserialiser.
pub fn unknown_fields<T: Serialize>(raw: &Map<String, Value>, typed: &T) -> Vec<String> {
    let known = match serde_json::to_value(typed) {
        Ok(Value::Object(map)) => map,
        _ => return raw.keys().cloned().collect(),
    };
    raw.keys()
        .filter(|key| !known.contains_key(key.as_str()))
        .cloned()
        .collect()
}
