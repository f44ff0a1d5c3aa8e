use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events delivered to a device through the push gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// A friend triggered this user
    RespawnTrigger {
        #[serde(rename = "senderId")]
        sender_id: Uuid,
        #[serde(rename = "senderUsername")]
        sender_username: String,
    },
}

/// A rendered push notification ready for a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Push gateways only carry string values in the data block.
    pub data: BTreeMap<String, String>,
}

impl PushEvent {
    pub fn to_message(&self) -> PushMessage {
        match self {
            Self::RespawnTrigger {
                sender_id,
                sender_username,
            } => {
                let mut data = BTreeMap::new();
                data.insert("type".to_string(), "respawn_trigger".to_string());
                data.insert("senderId".to_string(), sender_id.to_string());
                data.insert("senderUsername".to_string(), sender_username.clone());

                PushMessage {
                    title: "Return By Death!".to_string(),
                    body: format!("{} has called you back from death!", sender_username),
                    data,
                }
            }
        }
    }
}
