use serde::{Deserialize, Serialize};

use crate::data::CarePoints;
use crate::events::Event;
use crate::game::SessionSnapshot;
use crate::pet::PetUpdate;

// ============================================================================
// HTTP Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewSessionRequest {
    pub player_name: String,
    pub pet_name: String,
    pub species: String,
    pub breed: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeRequest {
    /// Index of the shop in the session
    #[serde(default)]
    pub shop: usize,
    pub item_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UseItemRequest {
    pub item_id: String,
}

// ============================================================================
// HTTP Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Item definition as sent to the front end
#[derive(Debug, Clone, Serialize)]
pub struct ClientItemDef {
    pub id: String,
    pub name: String,
    pub item_type: String,
    pub price: i32,
    pub care_points: CarePoints,
    pub description: String,
    pub sprite: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientSpeciesDef {
    pub id: String,
    pub display_name: String,
    pub breeds: Vec<String>,
    pub max_stat: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UseItemResponse {
    pub applied: CarePoints,
    pub pet: PetUpdate,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanResponse {
    pub cleaned: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoiseResponse {
    pub noise: String,
}

// ============================================================================
// WebSocket Messages
// ============================================================================

/// Client -> Server messages on the pet feed
#[derive(Debug, Clone)]
pub enum ClientMessage {
    UseItem(UseItemRequest),
    Clean,
    Buy(TradeRequest),
    Sell(TradeRequest),
    RequestSnapshot,
}

/// Server -> Client messages on the pet feed
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Snapshot(Box<SessionSnapshot>),
    PetUpdate(PetUpdate),
    Event(Event),
    Error { message: String },
}

impl ServerMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            ServerMessage::Snapshot(_) => "snapshot",
            ServerMessage::PetUpdate(_) => "petUpdate",
            ServerMessage::Event(_) => "event",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Encode as a MessagePack `[type, data]` array
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, String> {
    use rmpv::Value;

    let data = match msg {
        ServerMessage::Snapshot(snapshot) => rmpv::ext::to_value(snapshot.as_ref()),
        ServerMessage::PetUpdate(pet) => rmpv::ext::to_value(pet),
        ServerMessage::Event(event) => rmpv::ext::to_value(event),
        ServerMessage::Error { message } => {
            Ok(Value::Map(vec![(
                Value::String("message".into()),
                Value::String(message.clone().into()),
            )]))
        }
    }
    .map_err(|e| format!("Failed to convert {}: {}", msg.msg_type(), e))?;

    let array = Value::Array(vec![Value::String(msg.msg_type().into()), data]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &array)
        .map_err(|e| format!("Failed to encode MessagePack: {}", e))?;
    Ok(buf)
}

/// Decode a MessagePack `[type, data]` array from the client
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, String> {
    use std::io::Cursor;

    let mut cursor = Cursor::new(data);
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| format!("Failed to decode MessagePack: {}", e))?;

    let array = value.as_array().ok_or("Expected array")?;
    let msg_type = array
        .first()
        .and_then(|v| v.as_str())
        .ok_or("Missing message type")?;
    let payload = array.get(1).cloned().unwrap_or(rmpv::Value::Nil);

    fn payload_as<T: serde::de::DeserializeOwned>(payload: rmpv::Value) -> Result<T, String> {
        rmpv::ext::from_value(payload).map_err(|e| format!("Invalid payload: {}", e))
    }

    match msg_type {
        "useItem" => Ok(ClientMessage::UseItem(payload_as(payload)?)),
        "clean" => Ok(ClientMessage::Clean),
        "buy" => Ok(ClientMessage::Buy(payload_as(payload)?)),
        "sell" => Ok(ClientMessage::Sell(payload_as(payload)?)),
        "snapshot" => Ok(ClientMessage::RequestSnapshot),
        other => Err(format!("Unknown message type: {}", other)),
    }
}
