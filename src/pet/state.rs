use rand::Rng;
use serde::{Deserialize, Serialize};

use super::definition::SpeciesDefinition;
use crate::data::{CarePoints, ItemDefinition};

// ============================================================================
// Pet State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PetState {
    #[default]
    Idle,
    Happy,
    Hungry,
    Thirsty,
    Sad,
    Sick,
    Dead,
}

impl PetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PetState::Idle => "IDLE",
            PetState::Happy => "HAPPY",
            PetState::Hungry => "HUNGRY",
            PetState::Thirsty => "THIRSTY",
            PetState::Sad => "SAD",
            PetState::Sick => "SICK",
            PetState::Dead => "DEAD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IDLE" => Some(PetState::Idle),
            "HAPPY" => Some(PetState::Happy),
            "HUNGRY" => Some(PetState::Hungry),
            "THIRSTY" => Some(PetState::Thirsty),
            "SAD" => Some(PetState::Sad),
            "SICK" => Some(PetState::Sick),
            "DEAD" => Some(PetState::Dead),
            _ => None,
        }
    }
}

// ============================================================================
// Pet
// ============================================================================

#[derive(Debug, Clone)]
pub struct Pet {
    pub name: String,
    pub breed: String,
    pub state: PetState,
    pub age: i32,
    pub happiness: i32,
    pub hunger: i32,
    pub thirst: i32,
    pub health: i32,
    pub num_waste: i32,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    species: SpeciesDefinition,
}

/// Serializable pet view sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PetUpdate {
    pub name: String,
    pub species: String,
    pub breed: String,
    pub state: PetState,
    pub age: i32,
    pub happiness: i32,
    pub hunger: i32,
    pub thirst: i32,
    pub health: i32,
    pub num_waste: i32,
    pub max_stat: i32,
}

impl Pet {
    pub fn new(species: &SpeciesDefinition, name: &str, breed: &str) -> Self {
        let max = species.max_stat;
        Self {
            name: name.to_string(),
            breed: breed.to_string(),
            state: PetState::Happy,
            age: 0,
            happiness: max,
            hunger: max,
            thirst: max,
            health: max,
            num_waste: 0,
            likes: species.likes.clone(),
            dislikes: species.dislikes.clone(),
            species: species.clone(),
        }
    }

    pub fn species_id(&self) -> &str {
        &self.species.id
    }

    pub fn max_stat(&self) -> i32 {
        self.species.max_stat
    }

    pub fn is_alive(&self) -> bool {
        self.state != PetState::Dead
    }

    /// Overwrite all needs at once, clamped to the species range
    pub fn set_needs(&mut self, happiness: i32, hunger: i32, thirst: i32, health: i32) {
        let max = self.max_stat();
        self.happiness = happiness.clamp(0, max);
        self.hunger = hunger.clamp(0, max);
        self.thirst = thirst.clamp(0, max);
        self.health = health.clamp(0, max);
    }

    fn add_needs(&mut self, happiness: i32, hunger: i32, thirst: i32, health: i32) {
        self.set_needs(
            self.happiness.saturating_add(happiness),
            self.hunger.saturating_add(hunger),
            self.thirst.saturating_add(thirst),
            self.health.saturating_add(health),
        );
    }

    /// Advance the pet by one simulation tick. Returns true if anything changed.
    pub fn tick(&mut self, tick_index: u64) -> bool {
        if !self.is_alive() {
            return false;
        }

        let mut changed = false;

        if tick_index % self.species.decay_interval_ticks == 0 {
            let decay = self.species.decay;
            // Uncleaned waste wears on the pet
            let waste = self.num_waste;
            self.add_needs(
                decay.happiness.saturating_add(waste).saturating_neg(),
                decay.hunger.saturating_neg(),
                decay.thirst.saturating_neg(),
                decay.health.saturating_add(waste).saturating_neg(),
            );
            changed = true;
        }

        if tick_index % self.species.waste_interval_ticks == 0
            && self.num_waste < self.species.max_waste
        {
            self.num_waste += 1;
            changed = true;
        }

        if changed {
            self.refresh_state();
        }
        changed
    }

    /// Age the pet once per species age interval. Returns true on a birthday.
    pub fn age_up(&mut self, seconds_passed: u64) -> bool {
        if !self.is_alive() || seconds_passed == 0 {
            return false;
        }
        if seconds_passed % self.species.age_interval_seconds == 0 {
            self.age += 1;
            return true;
        }
        false
    }

    /// Apply an item's care points. Returns the points actually applied,
    /// or None if the pet can no longer be cared for.
    pub fn use_item(&mut self, item: &ItemDefinition) -> Option<CarePoints> {
        if !self.is_alive() {
            return None;
        }

        let mut points = item.care_points;
        if self.likes.iter().any(|id| *id == item.id) {
            points.happiness = points.happiness.saturating_add(points.happiness / 2);
        } else if self.dislikes.iter().any(|id| *id == item.id) {
            points.happiness /= 2;
        }

        self.add_needs(points.happiness, points.hunger, points.thirst, points.health);
        self.refresh_state();
        Some(points)
    }

    /// Remove all waste. Returns how much was cleaned.
    pub fn clean_waste(&mut self) -> i32 {
        let cleaned = self.num_waste;
        self.num_waste = 0;
        cleaned
    }

    /// Pick a random noise for this pet's species
    pub fn make_noise<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        if self.species.noises.is_empty() {
            return "...".to_string();
        }
        let index = rng.gen_range(0..self.species.noises.len());
        self.species.noises[index].clone()
    }

    /// Recompute the state from current needs. Returns the new state if it changed.
    pub fn refresh_state(&mut self) -> Option<PetState> {
        if self.state == PetState::Dead {
            return None;
        }

        let next = self.derive_state();
        if next != self.state {
            self.state = next;
            Some(next)
        } else {
            None
        }
    }

    fn derive_state(&self) -> PetState {
        // Widened so large species maximums cannot overflow
        let max = i64::from(self.max_stat());
        let low = |value: i32| i64::from(value) * 4 < max;
        let high = |value: i32| i64::from(value) * 4 >= max * 3;

        if self.health <= 0 {
            PetState::Dead
        } else if low(self.health) {
            PetState::Sick
        } else if low(self.hunger) {
            PetState::Hungry
        } else if low(self.thirst) {
            PetState::Thirsty
        } else if low(self.happiness) {
            PetState::Sad
        } else if high(self.happiness) && high(self.hunger) && high(self.thirst) && high(self.health) {
            PetState::Happy
        } else {
            PetState::Idle
        }
    }

    pub fn to_update(&self) -> PetUpdate {
        PetUpdate {
            name: self.name.clone(),
            species: self.species.id.clone(),
            breed: self.breed.clone(),
            state: self.state,
            age: self.age,
            happiness: self.happiness,
            hunger: self.hunger,
            thirst: self.thirst,
            health: self.health,
            num_waste: self.num_waste,
            max_stat: self.max_stat(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ItemType;
    use crate::pet::NeedDecay;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dog() -> SpeciesDefinition {
        let mut species = SpeciesDefinition::basic("Dog");
        species.noises = vec!["Woof!".to_string(), "Arf!".to_string()];
        species.likes = vec!["bone_toy".to_string()];
        species.dislikes = vec!["bath_toy".to_string()];
        species.decay = NeedDecay { happiness: 1, hunger: 10, thirst: 5, health: 0 };
        species.decay_interval_ticks = 2;
        species.waste_interval_ticks = 3;
        species.max_waste = 2;
        species.age_interval_seconds = 10;
        species
    }

    #[test]
    fn test_new_pet_starts_full() {
        let pet = Pet::new(&dog(), "Rex", "Beagle");
        assert_eq!(pet.hunger, 100);
        assert_eq!(pet.health, 100);
        assert_eq!(pet.state, PetState::Happy);
        assert_eq!(pet.species_id(), "Dog");
    }

    #[test]
    fn test_tick_decays_on_interval() {
        let mut pet = Pet::new(&dog(), "Rex", "Beagle");

        assert!(!pet.tick(1));
        assert_eq!(pet.hunger, 100);

        assert!(pet.tick(2));
        assert_eq!(pet.hunger, 90);
        assert_eq!(pet.thirst, 95);
        assert_eq!(pet.happiness, 99);
    }

    #[test]
    fn test_waste_accumulates_and_hurts() {
        let mut pet = Pet::new(&dog(), "Rex", "Beagle");
        pet.tick(3);
        assert_eq!(pet.num_waste, 1);

        pet.tick(4);
        assert_eq!(pet.health, 99);
        assert_eq!(pet.happiness, 98);

        pet.tick(6);
        pet.tick(9);
        assert_eq!(pet.num_waste, 2, "waste is capped");

        assert_eq!(pet.clean_waste(), 2);
        assert_eq!(pet.num_waste, 0);
    }

    #[test]
    fn test_use_item_clamps_and_prefers() {
        let mut pet = Pet::new(&dog(), "Rex", "Beagle");
        pet.set_needs(50, 10, 50, 80);

        let chicken = ItemDefinition::new("Chicken", ItemType::Food, 5, CarePoints::new(4, 200, 0, 0));
        let applied = pet.use_item(&chicken).unwrap();
        assert_eq!(applied.hunger, 200);
        assert_eq!(pet.hunger, 100);
        assert_eq!(pet.happiness, 54);

        let bone = ItemDefinition::new("Bone", ItemType::Toy, 3, CarePoints::new(10, 0, 0, 0));
        pet.use_item(&bone);
        assert_eq!(pet.happiness, 69);

        let bath = ItemDefinition::new("Bath", ItemType::Toy, 3, CarePoints::new(-10, 0, 0, 0));
        pet.use_item(&bath);
        assert_eq!(pet.happiness, 64);
    }

    #[test]
    fn test_state_transitions() {
        let mut pet = Pet::new(&dog(), "Rex", "Beagle");

        pet.set_needs(60, 60, 60, 60);
        assert_eq!(pet.refresh_state(), Some(PetState::Idle));
        assert_eq!(pet.refresh_state(), None);

        pet.set_needs(60, 10, 10, 60);
        assert_eq!(pet.refresh_state(), Some(PetState::Hungry));

        pet.set_needs(60, 60, 10, 60);
        assert_eq!(pet.refresh_state(), Some(PetState::Thirsty));

        pet.set_needs(10, 60, 60, 60);
        assert_eq!(pet.refresh_state(), Some(PetState::Sad));

        pet.set_needs(10, 10, 10, 20);
        assert_eq!(pet.refresh_state(), Some(PetState::Sick));

        pet.set_needs(10, 10, 10, 0);
        assert_eq!(pet.refresh_state(), Some(PetState::Dead));
    }

    #[test]
    fn test_state_with_huge_max_stat() {
        let mut species = dog();
        species.max_stat = i32::MAX;
        species.decay = NeedDecay { happiness: i32::MAX, hunger: 0, thirst: 0, health: 0 };
        let mut pet = Pet::new(&species, "Rex", "Beagle");

        pet.set_needs(i32::MAX / 2, i32::MAX, i32::MAX, i32::MAX);
        assert_eq!(pet.refresh_state(), Some(PetState::Idle));

        pet.set_needs(i32::MAX, i32::MAX, i32::MAX, i32::MAX);
        assert_eq!(pet.refresh_state(), Some(PetState::Happy));

        pet.num_waste = 1;
        assert!(pet.tick(2));
        assert_eq!(pet.happiness, 0);
        assert_eq!(pet.state, PetState::Sad);
    }

    #[test]
    fn test_dead_pet_ignores_care() {
        let mut pet = Pet::new(&dog(), "Rex", "Beagle");
        pet.set_needs(0, 0, 0, 0);
        pet.refresh_state();
        assert!(!pet.is_alive());

        let chicken = ItemDefinition::new("Chicken", ItemType::Food, 5, CarePoints::new(0, 20, 0, 50));
        assert!(pet.use_item(&chicken).is_none());
        assert!(!pet.tick(2));
        assert!(!pet.age_up(10));
        assert_eq!(pet.health, 0);
    }

    #[test]
    fn test_age_up_on_interval() {
        let mut pet = Pet::new(&dog(), "Rex", "Beagle");
        assert!(!pet.age_up(5));
        assert!(pet.age_up(10));
        assert!(pet.age_up(20));
        assert_eq!(pet.age, 2);
    }

    #[test]
    fn test_make_noise() {
        let pet = Pet::new(&dog(), "Rex", "Beagle");
        let mut rng = StdRng::seed_from_u64(7);
        let noise = pet.make_noise(&mut rng);
        assert!(noise == "Woof!" || noise == "Arf!");

        let quiet = Pet::new(&SpeciesDefinition::basic("Rock"), "Rocky", "Granite");
        assert_eq!(quiet.make_noise(&mut rng), "...");
    }

    #[test]
    fn test_pet_state_names() {
        assert_eq!(PetState::from_str("HUNGRY"), Some(PetState::Hungry));
        assert_eq!(PetState::from_str("hungry"), None);
        assert_eq!(serde_json::to_string(&PetState::Dead).unwrap(), "\"DEAD\"");
    }
}
