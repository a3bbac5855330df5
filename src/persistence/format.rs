//! On-disk layout of the save file.
//!
//! Slots keep their `data` as raw JSON so a session can be read or replaced
//! without decoding every other slot in the file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveFile {
    #[serde(default)]
    pub sessions: Vec<SessionSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSlot {
    pub id: u32,
    #[serde(default)]
    pub save_time: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: u32,
    pub save_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub seconds_passed: u64,
    pub ticks_passed: u64,
    pub player: PlayerRecord,
    pub pet: PetRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop: Option<ShopRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shops: Vec<ShopRecord>,
}

/// Items are stored by name and type, not by catalogue ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub money: i32,
    pub inventory: InventoryRecord,
}

/// Index-aligned item and quantity lists
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub quantities: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: String,
    pub breed: String,
    pub state: String,
    pub age: i32,
    pub happiness: i32,
    pub hunger: i32,
    pub thirst: i32,
    pub health: i32,
    pub num_waste: i32,
}

/// Index-aligned item, price and quantity lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopRecord {
    pub name: String,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub prices: Vec<i32>,
    #[serde(default)]
    pub quantities: Vec<i32>,
}
