//! Species Registry
//!
//! Loads species definitions from TOML files.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::definition::{RawSpeciesDefinition, SpeciesDefinition};
use crate::protocol::ClientSpeciesDef;

/// Species used when a save names a pet type that is not loaded
pub const FALLBACK_SPECIES: &str = "ExampleAnimal";

/// Registry for all pet species
#[derive(Debug, Clone)]
pub struct SpeciesRegistry {
    species: HashMap<String, SpeciesDefinition>,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        Self {
            species: HashMap::new(),
        }
    }

    /// Load all species definitions from `<data_dir>/pets`
    pub fn load_from_directory(&mut self, data_dir: &Path) -> Result<(), String> {
        let pets_dir = data_dir.join("pets");

        if !pets_dir.exists() {
            warn!("Pets directory does not exist: {:?}", pets_dir);
            return Ok(());
        }

        let entries = std::fs::read_dir(&pets_dir)
            .map_err(|e| format!("Failed to read directory {:?}: {}", pets_dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "toml") {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

                let table: HashMap<String, RawSpeciesDefinition> = toml::from_str(&content)
                    .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;

                for (id, raw) in table {
                    if self.species.contains_key(&id) {
                        warn!("Duplicate species ID '{}' in {:?}, overwriting", id, path);
                    }
                    self.species.insert(id.clone(), SpeciesDefinition::from_raw(&id, &raw));
                }
            }
        }

        info!("Loaded {} pet species", self.species.len());
        Ok(())
    }

    pub fn insert(&mut self, species: SpeciesDefinition) {
        self.species.insert(species.id.clone(), species);
    }

    /// Get a species by ID
    pub fn get(&self, species_id: &str) -> Option<&SpeciesDefinition> {
        self.species.get(species_id)
    }

    /// Resolve a saved pet type, falling back to the example animal
    pub fn resolve(&self, species_id: &str) -> Option<&SpeciesDefinition> {
        self.species.get(species_id).or_else(|| {
            warn!("Unknown pet type '{}', using {}", species_id, FALLBACK_SPECIES);
            self.species.get(FALLBACK_SPECIES)
        })
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Species list for the front end, sorted by ID
    pub fn to_client_definitions(&self) -> Vec<ClientSpeciesDef> {
        let mut defs: Vec<ClientSpeciesDef> = self
            .species
            .values()
            .map(|s| ClientSpeciesDef {
                id: s.id.clone(),
                display_name: s.display_name.clone(),
                breeds: s.breeds.clone(),
                max_stat: s.max_stat,
            })
            .collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }
}

impl Default for SpeciesRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_species_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        let pets_dir = temp_dir.path().join("pets");
        std::fs::create_dir(&pets_dir).unwrap();

        let toml_content = r#"
[Dog]
display_name = "Dog"
breeds = ["Beagle", "Corgi"]
noises = ["Woof!", "Arf!"]
likes = ["bone_toy"]
decay = { hunger = 3, thirst = 4 }
decay_interval_ticks = 10
"#;
        std::fs::write(pets_dir.join("dog.toml"), toml_content).unwrap();

        let mut registry = SpeciesRegistry::new();
        registry.load_from_directory(temp_dir.path()).unwrap();

        let dog = registry.get("Dog").unwrap();
        assert_eq!(dog.breeds.len(), 2);
        assert_eq!(dog.decay.hunger, 3);
        // Unset fields in a partial table keep the species default
        assert_eq!(dog.decay.happiness, 1);
        assert_eq!(dog.decay_interval_ticks, 10);
        assert_eq!(dog.max_stat, 100);
        assert_eq!(dog.default_breed(), "Beagle");
    }

    #[test]
    fn test_resolve_falls_back_to_example_animal() {
        let mut registry = SpeciesRegistry::new();
        assert!(registry.resolve("Cat").is_none());

        registry.insert(SpeciesDefinition::basic(FALLBACK_SPECIES));
        registry.insert(SpeciesDefinition::basic("Dog"));

        assert_eq!(registry.resolve("Dog").unwrap().id, "Dog");
        assert_eq!(registry.resolve("Cat").unwrap().id, FALLBACK_SPECIES);

        let ids: Vec<String> = registry.to_client_definitions().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["Dog".to_string(), FALLBACK_SPECIES.to_string()]);
    }
}
