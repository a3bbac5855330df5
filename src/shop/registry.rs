//! Shop Registry
//!
//! Loads and caches shop templates from TOML files.

use super::definition::{Shop, ShopTemplate};
use crate::data::ItemRegistry;
use rand::Rng;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Registry for all shop templates
#[derive(Debug, Clone)]
pub struct ShopRegistry {
    shops: HashMap<String, ShopTemplate>,
}

impl ShopRegistry {
    pub fn new() -> Self {
        Self {
            shops: HashMap::new(),
        }
    }

    /// Load all shop templates from a directory
    pub fn load_from_directory(&mut self, path: &Path) -> Result<(), String> {
        if !path.exists() {
            warn!("Shop directory does not exist: {:?}", path);
            return Ok(());
        }

        for entry in fs::read_dir(path).map_err(|e| e.to_string())? {
            let entry = entry.map_err(|e| e.to_string())?;
            let file_path = entry.path();

            if file_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                let contents = fs::read_to_string(&file_path)
                    .map_err(|e| format!("Failed to read {:?}: {}", file_path, e))?;

                let shop: ShopTemplate = toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse {:?}: {}", file_path, e))?;

                if self.shops.contains_key(&shop.id) {
                    warn!("Duplicate shop ID '{}' in {:?}, overwriting", shop.id, file_path);
                }

                self.shops.insert(shop.id.clone(), shop);
            }
        }

        info!("Loaded {} shop templates", self.shops.len());
        Ok(())
    }

    pub fn insert(&mut self, template: ShopTemplate) {
        self.shops.insert(template.id.clone(), template);
    }

    /// Stock a fresh shop for every template, ordered by template ID
    pub fn instantiate_all<R: Rng + ?Sized>(&self, catalogue: &ItemRegistry, rng: &mut R) -> Vec<Shop> {
        let mut ids: Vec<&String> = self.shops.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| self.shops.get(id))
            .map(|template| template.instantiate(catalogue, rng))
            .collect()
    }

    /// Restock amount for a live shop, looked up by its display name
    pub fn restock_quantity_for(&self, shop_name: &str) -> Option<i32> {
        self.shops
            .values()
            .find(|t| t.display_name == shop_name)
            .map(|t| t.restock_quantity)
    }

    pub fn contains(&self, shop_id: &str) -> bool {
        self.shops.contains_key(shop_id)
    }

    pub fn len(&self) -> usize {
        self.shops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shops.is_empty()
    }
}

impl Default for ShopRegistry {
    fn default() -> Self {
        Self::new()
    }
}
