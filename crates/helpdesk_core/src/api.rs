//! JSON response envelope for transport bindings.

use serde::{Deserialize, Serialize};

use crate::error::HelpdeskError;

/// `{success, message, data}` wrapper returned by API bindings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// HTTP status the binding should answer with
    #[serde(skip)]
    pub status: u16,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            status: 200,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: 201,
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(err: &HelpdeskError) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
            data: None,
            status: err.status_code(),
        }
    }

    pub fn from_result(result: Result<T, HelpdeskError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let envelope = ApiEnvelope::created(5).with_message("Chat created");
        assert_eq!(envelope.status, 201);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 5);
        assert_eq!(json["message"], "Chat created");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_error_envelope() {
        let envelope: ApiEnvelope<()> = ApiEnvelope::from_result(Err(HelpdeskError::ChatResolved));
        assert!(!envelope.success);
        assert_eq!(envelope.status, 422);
        assert_eq!(
            envelope.message.as_deref(),
            Some("This chat has been resolved. Please create a new chat.")
        );
    }
}
