use rand::Rng;
use serde::Serialize;

use crate::data::{CarePoints, GameData};
use crate::economy::{self, Receipt, TradeError};
use crate::events::{Event, EventLog};
use crate::item::{Inventory, InventoryEntry};
use crate::pet::{Pet, PetState, PetUpdate};
use crate::shop::{Shop, ShopStockItem};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Shop not found")]
    UnknownShop,
    #[error("Unknown species '{0}'")]
    UnknownSpecies(String),
    #[error("Item not found")]
    UnknownItem,
    #[error("Item not in inventory")]
    NotInInventory,
    #[error("Your pet can no longer be cared for")]
    PetDead,
    #[error(transparent)]
    Trade(#[from] TradeError),
}

// ============================================================================
// Player
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub money: i32,
    pub inventory: Inventory,
}

impl Player {
    pub fn new(name: &str, money: i32) -> Self {
        Self {
            name: name.to_string(),
            money: money.max(0),
            inventory: Inventory::new(),
        }
    }

    /// Spend money if the player can afford it
    pub fn spend(&mut self, amount: i32) -> bool {
        if amount < 0 || self.money < amount {
            return false;
        }
        self.money -= amount;
        true
    }

    pub fn earn(&mut self, amount: i32) {
        self.money = self.money.saturating_add(amount.max(0));
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerUpdate {
    pub name: String,
    pub money: i32,
    pub inventory: Vec<InventoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShopUpdate {
    pub name: String,
    pub stock: Vec<ShopStockItem>,
}

/// Full view of a session for the front end
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: u32,
    pub ticks_passed: u64,
    pub seconds_passed: u64,
    pub player: PlayerUpdate,
    pub pet: PetUpdate,
    pub shops: Vec<ShopUpdate>,
}

// ============================================================================
// Session Settings
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub ticks_per_second: u64,
    pub restock_interval_seconds: u64,
    pub sell_multiplier: f32,
    /// Restock amount for shops without a template
    pub default_restock_quantity: i32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
            restock_interval_seconds: 120,
            sell_multiplier: 0.5,
            default_restock_quantity: 5,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub pet_changed: bool,
    pub events: Vec<Event>,
}

// ============================================================================
// Game Session
// ============================================================================

pub struct GameSession {
    pub session_id: u32,
    pub player: Player,
    pub pet: Pet,
    pub shops: Vec<Shop>,
    pub ticks_passed: u64,
    pub seconds_passed: u64,
    pub events: EventLog,
    settings: SessionSettings,
}

impl GameSession {
    pub fn new(
        session_id: u32,
        player: Player,
        pet: Pet,
        shops: Vec<Shop>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            session_id,
            player,
            pet,
            shops,
            ticks_passed: 0,
            seconds_passed: 0,
            events: EventLog::new(),
            settings,
        }
    }

    /// Start a brand new game with a fresh pet and freshly stocked shops
    #[allow(clippy::too_many_arguments)]
    pub fn start_new<R: Rng + ?Sized>(
        data: &GameData,
        settings: SessionSettings,
        session_id: u32,
        player_name: &str,
        starting_money: i32,
        pet_name: &str,
        species_id: &str,
        breed: Option<&str>,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let species = data.species.get(species_id)
            .ok_or_else(|| GameError::UnknownSpecies(species_id.to_string()))?;
        let breed = breed.map(str::to_string).unwrap_or_else(|| species.default_breed());

        let pet = Pet::new(species, pet_name, &breed);
        let shops = data.shops.instantiate_all(&data.items, rng);

        let mut session = Self::new(
            session_id,
            Player::new(player_name, starting_money),
            pet,
            shops,
            settings,
        );
        session.log(format!("Started new game session ID {}.", session_id));
        Ok(session)
    }

    pub fn log(&mut self, description: impl Into<String>) -> Event {
        self.events.log(self.session_id, description)
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self, data: &GameData) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let was_alive = self.pet.is_alive();
        let previous_state = self.pet.state;

        self.ticks_passed += 1;
        outcome.pet_changed |= self.pet.tick(self.ticks_passed);

        if self.ticks_passed % self.settings.ticks_per_second.max(1) == 0 {
            self.seconds_passed += 1;

            if self.pet.age_up(self.seconds_passed) {
                outcome.pet_changed = true;
                let description = format!("{} is now {} years old.", self.pet.name, self.pet.age);
                outcome.events.push(self.log(description));
            }

            let interval = self.settings.restock_interval_seconds;
            if interval > 0 && self.seconds_passed % interval == 0 {
                self.restock_shops(data);
                outcome.events.push(self.log("The shops have been restocked."));
            }
        }

        if self.pet.state != previous_state {
            let description = if was_alive && !self.pet.is_alive() {
                format!("{} has passed away.", self.pet.name)
            } else {
                format!("{} is now {}.", self.pet.name, self.pet.state.as_str())
            };
            outcome.events.push(self.log(description));
        }

        outcome
    }

    fn restock_shops(&mut self, data: &GameData) {
        for shop in &mut self.shops {
            let quantity = data.shops
                .restock_quantity_for(shop.name())
                .unwrap_or(self.settings.default_restock_quantity);
            shop.stock_all_existing(quantity);
        }
    }

    pub fn buy(
        &mut self,
        data: &GameData,
        shop_index: usize,
        item_id: &str,
        quantity: i32,
    ) -> Result<Receipt, GameError> {
        let shop = self.shops.get_mut(shop_index).ok_or(GameError::UnknownShop)?;
        let receipt = economy::buy(&mut self.player, shop, &data.items, item_id, quantity)?;
        let shop_name = shop.name().to_string();

        self.log(format!(
            "{} bought {} x {} from {} for {}.",
            self.player.name, quantity, item_id, shop_name, receipt.total
        ));
        Ok(receipt)
    }

    pub fn sell(
        &mut self,
        data: &GameData,
        shop_index: usize,
        item_id: &str,
        quantity: i32,
    ) -> Result<Receipt, GameError> {
        let multiplier = self.settings.sell_multiplier;
        let shop = self.shops.get_mut(shop_index).ok_or(GameError::UnknownShop)?;
        let receipt = economy::sell(&mut self.player, shop, &data.items, item_id, quantity, multiplier)?;
        let shop_name = shop.name().to_string();

        self.log(format!(
            "{} sold {} x {} to {} for {}.",
            self.player.name, quantity, item_id, shop_name, receipt.total
        ));
        Ok(receipt)
    }

    /// Give one held item to the pet
    pub fn use_item(&mut self, data: &GameData, item_id: &str) -> Result<CarePoints, GameError> {
        let item = data.items.get(item_id).ok_or(GameError::UnknownItem)?;
        if !self.player.inventory.contains(item_id) {
            return Err(GameError::NotInInventory);
        }
        if !self.pet.is_alive() {
            return Err(GameError::PetDead);
        }

        let previous_state = self.pet.state;
        let applied = self.pet.use_item(item).ok_or(GameError::PetDead)?;
        self.player.inventory.remove_item(item_id, 1);

        self.log(format!("{} used {} on {}.", self.player.name, item.name, self.pet.name));
        if self.pet.state != previous_state {
            self.log(format!("{} is now {}.", self.pet.name, self.pet.state.as_str()));
        }
        Ok(applied)
    }

    pub fn clean_waste(&mut self) -> i32 {
        let cleaned = self.pet.clean_waste();
        if cleaned > 0 {
            self.log(format!("{} cleaned up after {}.", self.player.name, self.pet.name));
        }
        cleaned
    }

    pub fn make_noise<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.pet.make_noise(rng)
    }

    pub fn is_pet_dead(&self) -> bool {
        self.pet.state == PetState::Dead
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            ticks_passed: self.ticks_passed,
            seconds_passed: self.seconds_passed,
            player: PlayerUpdate {
                name: self.player.name.clone(),
                money: self.player.money,
                inventory: self.player.inventory.entries().to_vec(),
            },
            pet: self.pet.to_update(),
            shops: self.shops
                .iter()
                .map(|shop| ShopUpdate {
                    name: shop.name().to_string(),
                    stock: shop.entries().to_vec(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{ItemDefinition, ItemType};
    use crate::pet::{NeedDecay, SpeciesDefinition, FALLBACK_SPECIES};
    use crate::shop::ShopTemplate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Small data set shared by session and persistence tests
    pub(crate) fn test_data() -> GameData {
        let mut data = GameData::default();
        data.items.insert(ItemDefinition::new("Chicken", ItemType::Food, 5, CarePoints::new(2, 20, 0, 0)));
        data.items.insert(ItemDefinition::new("Squeaky Mouse", ItemType::Toy, 8, CarePoints::new(15, 0, 0, 0)));
        data.items.insert(ItemDefinition::new("Bone", ItemType::Toy, 3, CarePoints::new(10, 0, 0, 0)));
        data.items.insert(ItemDefinition::new("Water", ItemType::Drink, 1, CarePoints::new(0, 0, 25, 0)));

        let mut dog = SpeciesDefinition::basic("Dog");
        dog.breeds = vec!["Beagle".to_string()];
        dog.noises = vec!["Woof!".to_string()];
        dog.decay = NeedDecay { happiness: 1, hunger: 2, thirst: 2, health: 0 };
        dog.decay_interval_ticks = 2;
        dog.waste_interval_ticks = 1000;
        dog.age_interval_seconds = 2;
        data.species.insert(dog);
        data.species.insert(SpeciesDefinition::basic(FALLBACK_SPECIES));

        let template: ShopTemplate = toml::from_str(
            r#"
id = "pet_mart"
display_name = "Pet Mart"
restock_quantity = 2

[[stock]]
item_id = "chicken_food"
quantity = 10

[[stock]]
item_id = "bone_toy"
quantity = 1
"#,
        )
        .unwrap();
        data.shops.insert(template);
        data
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            ticks_per_second: 2,
            restock_interval_seconds: 3,
            sell_multiplier: 0.5,
            default_restock_quantity: 5,
        }
    }

    pub(crate) fn new_session(data: &GameData) -> GameSession {
        let mut rng = StdRng::seed_from_u64(9);
        GameSession::start_new(data, settings(), 1, "Ash", 50, "Rex", "Dog", None, &mut rng).unwrap()
    }

    #[test]
    fn test_start_new() {
        let data = test_data();
        let session = new_session(&data);

        assert_eq!(session.pet.breed, "Beagle");
        assert_eq!(session.player.money, 50);
        assert_eq!(session.shops.len(), 1);
        assert_eq!(session.shops[0].item_quantity("chicken_food"), Some(10));
        assert_eq!(session.events.len(), 1);

        let mut rng = StdRng::seed_from_u64(9);
        let err = GameSession::start_new(&data, settings(), 2, "Ash", 50, "Tom", "Cat", None, &mut rng)
            .err()
            .unwrap();
        assert_eq!(err, GameError::UnknownSpecies("Cat".to_string()));
    }

    #[test]
    fn test_tick_counts_time_and_restocks() {
        let data = test_data();
        let mut session = new_session(&data);

        for _ in 0..4 {
            session.tick(&data);
        }
        assert_eq!(session.ticks_passed, 4);
        assert_eq!(session.seconds_passed, 2);
        assert_eq!(session.pet.age, 1);
        assert_eq!(session.pet.hunger, 96);

        session.tick(&data);
        let outcome = session.tick(&data);
        assert_eq!(session.seconds_passed, 3);
        assert!(outcome.events.iter().any(|e| e.description.contains("restocked")));
        assert_eq!(session.shops[0].item_quantity("chicken_food"), Some(12));
    }

    #[test]
    fn test_buy_and_use_item() {
        let data = test_data();
        let mut session = new_session(&data);
        session.pet.set_needs(100, 50, 100, 100);

        session.buy(&data, 0, "chicken_food", 2).unwrap();
        assert_eq!(session.player.money, 40);

        let applied = session.use_item(&data, "chicken_food").unwrap();
        assert_eq!(applied.hunger, 20);
        assert_eq!(session.pet.hunger, 70);
        assert_eq!(session.player.inventory.quantity_of("chicken_food"), 1);

        assert_eq!(session.use_item(&data, "bone_toy"), Err(GameError::NotInInventory));
        assert_eq!(session.use_item(&data, "caviar_food"), Err(GameError::UnknownItem));
        assert_eq!(
            session.buy(&data, 3, "chicken_food", 1).unwrap_err(),
            GameError::UnknownShop
        );
        assert_eq!(
            session.buy(&data, 0, "bone_toy", 2).unwrap_err(),
            GameError::Trade(TradeError::InsufficientStock)
        );
    }

    #[test]
    fn test_sell() {
        let data = test_data();
        let mut session = new_session(&data);
        session.player.inventory.add_item("squeakymouse_toy", 1);

        let receipt = session.sell(&data, 0, "squeakymouse_toy", 1).unwrap();
        assert_eq!(receipt.total, 4);
        assert_eq!(session.player.money, 54);
        assert_eq!(session.shops[0].item_quantity("squeakymouse_toy"), Some(1));
    }

    #[test]
    fn test_dead_pet_keeps_items() {
        let data = test_data();
        let mut session = new_session(&data);
        session.player.inventory.add_item("chicken_food", 1);
        session.pet.set_needs(0, 0, 0, 0);
        session.pet.refresh_state();

        assert_eq!(session.use_item(&data, "chicken_food"), Err(GameError::PetDead));
        assert_eq!(session.player.inventory.quantity_of("chicken_food"), 1);
        assert!(session.is_pet_dead());
    }

    #[test]
    fn test_clean_and_snapshot() {
        let data = test_data();
        let mut session = new_session(&data);
        session.pet.num_waste = 2;

        assert_eq!(session.clean_waste(), 2);
        assert_eq!(session.clean_waste(), 0);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.pet.num_waste, 0);
        assert_eq!(snapshot.shops[0].name, "Pet Mart");
        assert_eq!(snapshot.player.money, 50);

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(session.make_noise(&mut rng), "Woof!");
    }
}
