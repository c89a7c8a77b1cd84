//! Transport addresses carried (serialized) inside global discovery entries.

use serde::{Deserialize, Serialize};

use crate::errors::RuntimeError;

/// Where messages for a participant are physically delivered.
///
/// Global discovery entries carry the address as an opaque JSON string; this
/// enum is the decoded form used for routing and backend filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "_typeName")]
pub enum Address {
    /// MQTT endpoint. `broker_uri` holds the gbid of the backend.
    #[serde(rename = "MqttAddress", rename_all = "camelCase")]
    Mqtt { broker_uri: String, topic: String },

    /// HTTP long-polling channel.
    #[serde(rename = "ChannelAddress", rename_all = "camelCase")]
    Channel {
        messaging_endpoint_url: String,
        channel_id: String,
    },

    /// WebSocket server endpoint.
    #[serde(rename = "WebSocketAddress", rename_all = "camelCase")]
    WebSocket {
        host: String,
        port: u16,
        path: String,
    },
}

impl Address {
    /// Serialize into the opaque form stored in discovery entries.
    pub fn to_serialized(&self) -> Result<String, RuntimeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode an address previously produced by [`Address::to_serialized`].
    pub fn from_serialized(serialized: &str) -> Result<Self, RuntimeError> {
        Ok(serde_json::from_str(serialized)?)
    }

    /// The backend this address belongs to, if the transport encodes one.
    pub fn gbid(&self) -> Option<&str> {
        match self {
            Address::Mqtt { broker_uri, .. } => Some(broker_uri.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_address_wire_shape() {
        let address = Address::Mqtt {
            broker_uri: "backend-a".to_string(),
            topic: "cc/1".to_string(),
        };
        let serialized = address.to_serialized().unwrap();
        assert!(serialized.contains("\"_typeName\":\"MqttAddress\""));
        assert!(serialized.contains("\"brokerUri\":\"backend-a\""));
        assert_eq!(Address::from_serialized(&serialized).unwrap(), address);
        assert_eq!(address.gbid(), Some("backend-a"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = Address::from_serialized("not an address").unwrap_err();
        assert!(matches!(err, RuntimeError::Serialization(_)));
    }
}
