use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::item_def::{ItemDefinition, ItemType, RawItemDefinition};
use crate::protocol::ClientItemDef;

/// Registry for all item definitions
#[derive(Debug, Clone)]
pub struct ItemRegistry {
    items: HashMap<String, ItemDefinition>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Load all item definitions from a directory
    pub fn load_from_directory(&mut self, data_dir: &Path) -> Result<(), String> {
        let items_dir = data_dir.join("items");

        if !items_dir.exists() {
            warn!("Items directory does not exist: {:?}", items_dir);
            return Ok(());
        }

        let entries = std::fs::read_dir(&items_dir)
            .map_err(|e| format!("Failed to read items directory: {}", e))?;

        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "toml") {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

                // Parse as table of items
                let table: HashMap<String, RawItemDefinition> = toml::from_str(&content)
                    .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;

                for (id, raw) in table {
                    if self.items.contains_key(&id) {
                        warn!("Duplicate item ID '{}' in {:?}, overwriting", id, path);
                    }
                    self.items.insert(id.clone(), ItemDefinition::from_raw(&id, &raw));
                }
            }
        }

        self.warn_shared_names();
        info!("Loaded {} item definitions", self.items.len());

        Ok(())
    }

    /// Add or replace a single definition
    pub fn insert(&mut self, item: ItemDefinition) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&ItemDefinition> {
        self.items.get(id)
    }

    /// Find an item by its display name and type, as stored in save files.
    /// When several IDs share the pair, the lowest ID wins.
    pub fn find(&self, name: &str, item_type: ItemType) -> Option<&ItemDefinition> {
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.items.get(id))
            .find(|item| item.matches(name, item_type))
    }

    /// Save files only know items by name and type, so IDs sharing both are ambiguous
    fn warn_shared_names(&self) {
        let mut seen: HashMap<(&str, ItemType), &str> = HashMap::new();
        for id in self.sorted_ids() {
            let Some(item) = self.items.get(id) else {
                continue;
            };
            if let Some(first) = seen.insert((item.name.as_str(), item.item_type), id.as_str()) {
                warn!(
                    "Items '{}' and '{}' are both {} '{}', saves will resolve to '{}'",
                    first,
                    id,
                    item.item_type.as_str(),
                    item.name,
                    first
                );
                seen.insert((item.name.as_str(), item.item_type), first);
            }
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }

    /// Item IDs in a stable order
    pub fn sorted_ids(&self) -> Vec<&String> {
        let mut ids: Vec<&String> = self.ids().collect();
        ids.sort();
        ids
    }

    pub fn all(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.values()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item definitions for the front end, sorted by ID
    pub fn to_client_definitions(&self) -> Vec<ClientItemDef> {
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.items.get(id))
            .map(|item| ClientItemDef {
                id: item.id.clone(),
                name: item.name.clone(),
                item_type: item.item_type.as_str().to_string(),
                price: item.price,
                care_points: item.care_points,
                description: item.description.clone(),
                sprite: item.sprite.clone(),
            })
            .collect()
    }
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}
