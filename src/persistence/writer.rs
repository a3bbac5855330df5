use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::format::{
    InventoryRecord, ItemRecord, PetRecord, PlayerRecord, SaveFile, SessionRecord, SessionSlot,
    ShopRecord,
};
use super::reader::PersistenceReader;
use super::PersistenceError;
use crate::data::{GameData, ItemRegistry};
use crate::game::GameSession;
use crate::shop::Shop;

const SAVE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes game sessions into a save file, one slot per session ID
pub struct PersistenceWriter {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl PersistenceWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot a session into its save record
    pub fn session_record(
        session: &GameSession,
        data: &GameData,
    ) -> Result<SessionRecord, PersistenceError> {
        let items = &data.items;
        let pet = &session.pet;

        let shops = session
            .shops
            .iter()
            .map(|shop| shop_record(shop, items))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SessionRecord {
            seconds_passed: session.seconds_passed,
            ticks_passed: session.ticks_passed,
            player: PlayerRecord {
                name: session.player.name.clone(),
                money: session.player.money,
                inventory: InventoryRecord {
                    items: session
                        .player
                        .inventory
                        .entries()
                        .iter()
                        .map(|e| item_record(&e.item_id, items))
                        .collect::<Result<Vec<_>, _>>()?,
                    quantities: session
                        .player
                        .inventory
                        .entries()
                        .iter()
                        .map(|e| e.quantity)
                        .collect(),
                },
            },
            pet: PetRecord {
                name: pet.name.clone(),
                pet_type: pet.species_id().to_string(),
                breed: pet.breed.clone(),
                state: pet.state.as_str().to_string(),
                age: pet.age,
                happiness: pet.happiness,
                hunger: pet.hunger,
                thirst: pet.thirst,
                health: pet.health,
                num_waste: pet.num_waste,
            },
            shop: shops.first().cloned(),
            shops,
        })
    }

    /// Save a session, replacing any slot with the same ID
    pub fn save(&self, session: &GameSession, data: &GameData) -> Result<(), PersistenceError> {
        let record = Self::session_record(session, data)?;
        self.write_record(session.session_id, &record)
    }

    /// Store an already built record under `session_id`
    pub fn write_record(&self, session_id: u32, record: &SessionRecord) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut save_file = PersistenceReader::open(&self.path)?.into_save_file();
        let slot = SessionSlot {
            id: session_id,
            save_time: chrono::Local::now().format(SAVE_TIME_FORMAT).to_string(),
            data: serde_json::to_value(record)?,
        };

        save_file.sessions.retain(|s| s.id != session_id);
        save_file.sessions.push(slot);
        save_file.sessions.sort_by_key(|s| s.id);

        self.write_file(&save_file)?;
        info!("Saved game session ID {} to {:?}", session_id, self.path);
        Ok(())
    }

    /// Remove a session slot. Returns whether it existed.
    pub fn delete_session(&self, session_id: u32) -> Result<bool, PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut save_file = PersistenceReader::open(&self.path)?.into_save_file();
        let before = save_file.sessions.len();
        save_file.sessions.retain(|s| s.id != session_id);

        if save_file.sessions.len() == before {
            return Ok(false);
        }

        self.write_file(&save_file)?;
        info!("Deleted game session ID {} from {:?}", session_id, self.path);
        Ok(true)
    }

    /// Write through a temp file in the same directory so readers never see a partial file
    fn write_file(&self, save_file: &SaveFile) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(save_file)?;
        let tmp_path = self.path.with_extension("json.tmp");

        std::fs::write(&tmp_path, content).map_err(|e| PersistenceError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| PersistenceError::io(&self.path, e))?;

        debug!("Wrote {} session(s) to {:?}", save_file.sessions.len(), self.path);
        Ok(())
    }
}

fn item_record(item_id: &str, items: &ItemRegistry) -> Result<ItemRecord, PersistenceError> {
    let item = items.get(item_id).ok_or_else(|| PersistenceError::UnknownItem {
        name: item_id.to_string(),
        item_type: String::new(),
    })?;

    Ok(ItemRecord {
        name: item.name.clone(),
        item_type: item.item_type.as_str().to_string(),
    })
}

fn shop_record(shop: &Shop, items: &ItemRegistry) -> Result<ShopRecord, PersistenceError> {
    Ok(ShopRecord {
        name: shop.name().to_string(),
        items: shop
            .items()
            .into_iter()
            .map(|id| item_record(id, items))
            .collect::<Result<Vec<_>, _>>()?,
        prices: shop.prices(),
        quantities: shop.quantities(),
    })
}
