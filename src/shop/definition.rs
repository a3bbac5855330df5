//! Shop Definition Structures
//!
//! Defines the live shop inventory and the TOML templates new games are
//! stocked from.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{ItemDefinition, ItemRegistry};

/// An item stocked in a shop with its unit price and quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopStockItem {
    pub item_id: String,
    pub price: i32,
    pub quantity: i32,
}

/// Raised when a shop is rebuilt from item, price and quantity lists of
/// different lengths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("shop lists differ in length: {items} items, {prices} prices, {quantities} quantities")]
pub struct MismatchedStockLists {
    pub items: usize,
    pub prices: usize,
    pub quantities: usize,
}

/// A shop and its current stock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shop {
    name: String,
    stock: Vec<ShopStockItem>,
}

impl Shop {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stock: Vec::new(),
        }
    }

    /// Rebuild a shop from index-aligned item, price and quantity lists
    pub fn from_parallel(
        name: &str,
        items: Vec<String>,
        prices: Vec<i32>,
        quantities: Vec<i32>,
    ) -> Result<Self, MismatchedStockLists> {
        if items.len() != prices.len() || items.len() != quantities.len() {
            return Err(MismatchedStockLists {
                items: items.len(),
                prices: prices.len(),
                quantities: quantities.len(),
            });
        }

        let stock = items
            .into_iter()
            .zip(prices)
            .zip(quantities)
            .map(|((item_id, price), quantity)| ShopStockItem { item_id, price, quantity })
            .collect();

        Ok(Self {
            name: name.to_string(),
            stock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[ShopStockItem] {
        &self.stock
    }

    pub fn items(&self) -> Vec<&str> {
        self.stock.iter().map(|s| s.item_id.as_str()).collect()
    }

    pub fn prices(&self) -> Vec<i32> {
        self.stock.iter().map(|s| s.price).collect()
    }

    pub fn quantities(&self) -> Vec<i32> {
        self.stock.iter().map(|s| s.quantity).collect()
    }

    pub fn len(&self) -> usize {
        self.stock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    /// Get immutable reference to stock item by item_id
    pub fn get_stock(&self, item_id: &str) -> Option<&ShopStockItem> {
        self.stock.iter().find(|s| s.item_id == item_id)
    }

    /// Get mutable reference to stock item by item_id
    pub fn get_stock_mut(&mut self, item_id: &str) -> Option<&mut ShopStockItem> {
        self.stock.iter_mut().find(|s| s.item_id == item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.get_stock(item_id).is_some()
    }

    /// Stock a new item at its catalogue price. Already stocked items are left alone.
    pub fn add_item(&mut self, item: &ItemDefinition, quantity: i32) {
        self.add_item_with_price(&item.id, item.price, quantity);
    }

    pub fn add_item_with_price(&mut self, item_id: &str, price: i32, quantity: i32) {
        if self.contains(item_id) {
            return;
        }
        self.stock.push(ShopStockItem {
            item_id: item_id.to_string(),
            price,
            quantity,
        });
    }

    /// Remove an item along with its price and quantity
    pub fn remove_item(&mut self, item_id: &str) {
        self.stock.retain(|s| s.item_id != item_id);
    }

    pub fn item_quantity(&self, item_id: &str) -> Option<i32> {
        self.get_stock(item_id).map(|s| s.quantity)
    }

    /// Overwrite the quantity. A quantity of zero keeps the item listed.
    pub fn set_item_quantity(&mut self, item_id: &str, quantity: i32) {
        if let Some(stock) = self.get_stock_mut(item_id) {
            stock.quantity = quantity;
        }
    }

    pub fn item_price(&self, item_id: &str) -> Option<i32> {
        self.get_stock(item_id).map(|s| s.price)
    }

    pub fn set_item_price(&mut self, item_id: &str, price: i32) {
        if let Some(stock) = self.get_stock_mut(item_id) {
            stock.price = price;
        }
    }

    /// Add `delta` to an item's quantity, removing the item once none are left
    pub fn change_item_quantity(&mut self, item_id: &str, delta: i32) {
        let Some(stock) = self.get_stock_mut(item_id) else {
            return;
        };

        stock.quantity = stock.quantity.saturating_add(delta);
        if stock.quantity <= 0 {
            self.remove_item(item_id);
        }
    }

    /// Restock every listed item by `quantity`
    pub fn stock_all_existing(&mut self, quantity: i32) {
        let ids: Vec<String> = self.stock.iter().map(|s| s.item_id.clone()).collect();
        for id in ids {
            self.change_item_quantity(&id, quantity);
        }
    }

    /// Stock up to `num_items` random catalogue items the shop does not list yet.
    /// Returns how many were added.
    pub fn stock_with_random_items<R: Rng + ?Sized>(
        &mut self,
        catalogue: &ItemRegistry,
        num_items: usize,
        quantity: i32,
        rng: &mut R,
    ) -> usize {
        let mut candidates: Vec<&ItemDefinition> = catalogue
            .sorted_ids()
            .into_iter()
            .filter(|id| !self.contains(id))
            .filter_map(|id| catalogue.get(id))
            .collect();

        let mut added = 0;
        while added < num_items && !candidates.is_empty() {
            let index = rng.gen_range(0..candidates.len());
            let item = candidates.swap_remove(index);
            self.add_item(item, quantity);
            added += 1;
        }
        added
    }
}

// ============================================================================
// Shop Templates (TOML)
// ============================================================================

/// A shop as configured in the data directory
#[derive(Debug, Clone, Deserialize)]
pub struct ShopTemplate {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub stock: Vec<TemplateStockItem>,
    #[serde(default)]
    pub random_items: usize,
    #[serde(default = "default_quantity")]
    pub random_quantity: i32,
    #[serde(default = "default_quantity")]
    pub restock_quantity: i32,
}

/// A fixed stock line in a shop template
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateStockItem {
    pub item_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    /// Overrides the catalogue price when set
    pub price: Option<i32>,
}

fn default_quantity() -> i32 { 5 }

impl ShopTemplate {
    /// Build a fresh shop: fixed stock first, then random extras
    pub fn instantiate<R: Rng + ?Sized>(&self, catalogue: &ItemRegistry, rng: &mut R) -> Shop {
        let mut shop = Shop::new(&self.display_name);

        for line in &self.stock {
            match catalogue.get(&line.item_id) {
                Some(item) => {
                    let price = line.price.unwrap_or(item.price);
                    shop.add_item_with_price(&item.id, price, line.quantity);
                }
                None => {
                    tracing::warn!(
                        "Shop '{}' lists unknown item '{}', skipping",
                        self.id,
                        line.item_id
                    );
                }
            }
        }

        if self.random_items > 0 {
            shop.stock_with_random_items(catalogue, self.random_items, self.random_quantity, rng);
        }

        shop
    }
}
