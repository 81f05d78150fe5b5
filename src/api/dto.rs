//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================
// BROADCAST DTOs
// ============================================

/// Broadcast trigger request
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Payload to fan out; absent or empty is rejected
    #[serde(default)]
    pub message: Option<Value>,
}

/// Broadcast trigger response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    /// Connections in the live set when the broadcast started
    pub client_count: usize,
}

// ============================================
// STATUS DTOs
// ============================================

/// Connection statistics
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub clients_count: usize,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: String,
    /// Live WebSocket connections
    pub connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_request_without_message() {
        let req: SendRequest = serde_json::from_str("{}").unwrap();
        assert!(req.message.is_none());
    }

    #[test]
    fn test_send_request_keeps_any_json() {
        let req: SendRequest =
            serde_json::from_str(r#"{"message": {"lat": 12.97, "lng": 77.59}}"#).unwrap();
        assert_eq!(req.message, Some(json!({"lat": 12.97, "lng": 77.59})));
    }

    #[test]
    fn test_send_response_field_names() {
        let json = serde_json::to_value(SendResponse {
            success: true,
            client_count: 3,
        })
        .unwrap();
        assert_eq!(json, json!({"success": true, "clientCount": 3}));
    }
}
