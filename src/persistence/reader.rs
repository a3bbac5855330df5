use std::path::Path;
use tracing::info;

use super::format::{
    InventoryRecord, ItemRecord, PetRecord, PlayerRecord, SaveFile, SessionRecord, SessionSlot,
    SessionSummary, ShopRecord,
};
use super::PersistenceError;
use crate::data::{GameData, ItemRegistry, ItemType};
use crate::game::{GameSession, Player, SessionSettings};
use crate::item::Inventory;
use crate::pet::{Pet, PetState};
use crate::shop::Shop;

/// Reads game sessions back out of a save file
pub struct PersistenceReader {
    save_file: SaveFile,
}

impl PersistenceReader {
    /// Read a save file. A file that does not exist yet reads as empty.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self { save_file: SaveFile::default() });
            }
            Err(e) => return Err(PersistenceError::io(path, e)),
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PersistenceError> {
        let save_file: SaveFile = serde_json::from_str(content)?;
        Ok(Self { save_file })
    }

    pub fn into_save_file(self) -> SaveFile {
        self.save_file
    }

    /// Find the slot for a session. When an ID appears twice the last slot wins.
    pub fn find_session(&self, session_id: u32) -> Option<&SessionSlot> {
        self.save_file.sessions.iter().rev().find(|s| s.id == session_id)
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.save_file
            .sessions
            .iter()
            .map(|s| SessionSummary {
                id: s.id,
                save_time: s.save_time.clone(),
            })
            .collect()
    }

    /// Lowest ID above every stored session
    pub fn next_session_id(&self) -> u32 {
        self.save_file
            .sessions
            .iter()
            .map(|s| s.id)
            .max()
            .map_or(1, |id| id.saturating_add(1))
    }

    /// Rebuild a game session from its slot
    pub fn load(
        &self,
        session_id: u32,
        data: &GameData,
        settings: SessionSettings,
    ) -> Result<GameSession, PersistenceError> {
        let slot = self
            .find_session(session_id)
            .ok_or(PersistenceError::SessionNotFound(session_id))?;
        let record: SessionRecord = serde_json::from_value(slot.data.clone())?;

        let player = player_from_record(&record.player, &data.items)?;
        let pet = pet_from_record(&record.pet, data)?;

        let shop_records: Vec<&ShopRecord> = if record.shops.is_empty() {
            record.shop.iter().collect()
        } else {
            record.shops.iter().collect()
        };
        let shops = shop_records
            .into_iter()
            .map(|shop| shop_from_record(shop, &data.items))
            .collect::<Result<Vec<_>, _>>()?;

        let mut session = GameSession::new(session_id, player, pet, shops, settings);
        session.ticks_passed = record.ticks_passed;
        session.seconds_passed = record.seconds_passed;
        session.log(format!("Loaded game session ID {}.", session_id));

        info!(
            "Loaded session {} saved at {} ({} shop(s))",
            session_id,
            slot.save_time,
            session.shops.len()
        );
        Ok(session)
    }
}

/// Convenience: open a save file and load one session from it
pub fn load(
    path: &Path,
    session_id: u32,
    data: &GameData,
    settings: SessionSettings,
) -> Result<GameSession, PersistenceError> {
    PersistenceReader::open(path)?.load(session_id, data, settings)
}

fn resolve_item(record: &ItemRecord, items: &ItemRegistry) -> Result<String, PersistenceError> {
    let unknown = || PersistenceError::UnknownItem {
        name: record.name.clone(),
        item_type: record.item_type.clone(),
    };

    let item_type = ItemType::from_str(&record.item_type).ok_or_else(unknown)?;
    items
        .find(&record.name, item_type)
        .map(|item| item.id.clone())
        .ok_or_else(unknown)
}

fn inventory_from_record(
    record: &InventoryRecord,
    items: &ItemRegistry,
) -> Result<Inventory, PersistenceError> {
    if record.items.len() != record.quantities.len() {
        return Err(PersistenceError::InventoryMismatch {
            items: record.items.len(),
            quantities: record.quantities.len(),
        });
    }

    let mut inventory = Inventory::new();
    for (item, quantity) in record.items.iter().zip(&record.quantities) {
        inventory.add_item(&resolve_item(item, items)?, *quantity);
    }
    Ok(inventory)
}

fn player_from_record(
    record: &PlayerRecord,
    items: &ItemRegistry,
) -> Result<Player, PersistenceError> {
    let mut player = Player::new(&record.name, record.money);
    player.inventory = inventory_from_record(&record.inventory, items)?;
    Ok(player)
}

fn pet_from_record(record: &PetRecord, data: &GameData) -> Result<Pet, PersistenceError> {
    let species = data
        .species
        .resolve(&record.pet_type)
        .ok_or_else(|| PersistenceError::UnknownSpecies(record.pet_type.clone()))?;
    let state = PetState::from_str(&record.state)
        .ok_or_else(|| PersistenceError::UnknownPetState(record.state.clone()))?;

    let mut pet = Pet::new(species, &record.name, &record.breed);
    pet.state = state;
    pet.age = record.age;
    pet.set_needs(record.happiness, record.hunger, record.thirst, record.health);
    pet.num_waste = record.num_waste.max(0);
    Ok(pet)
}

fn shop_from_record(record: &ShopRecord, items: &ItemRegistry) -> Result<Shop, PersistenceError> {
    let ids = record
        .items
        .iter()
        .map(|item| resolve_item(item, items))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Shop::from_parallel(
        &record.name,
        ids,
        record.prices.clone(),
        record.quantities.clone(),
    )?)
}
