//! Request/response bodies for the REST API and the WebSocket wire frame.

use serde::{Deserialize, Serialize};

/// The frame pushed to every live connection of every conversation member
/// when a message is posted. Serialized once per event so all deliveries
/// share identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageFrame {
    pub convo_id: i64,
    pub content: String,
    pub originator: i64,
}

/// POST /token response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// GET /users item.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub nickname: String,
}

/// GET /conv item.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvSummary {
    pub id: i64,
    pub label: String,
}

/// GET /conv/{id} item. `ts` is seconds since the Unix epoch.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub sender: i64,
    pub content: String,
    pub ts: f64,
}

/// POST /usermsg request.
#[derive(Debug, Deserialize, Serialize)]
pub struct MsgInput {
    pub conversation_id: i64,
    pub content: String,
}

/// POST /usermsg response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MsgOutput {
    pub status: String,
    pub messageid: i64,
}
