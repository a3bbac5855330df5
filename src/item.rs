use serde::Serialize;

// ============================================================================
// Inventory
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub item_id: String,
    pub quantity: i32,
}

impl InventoryEntry {
    pub fn new(item_id: &str, quantity: i32) -> Self {
        Self {
            item_id: item_id.to_string(),
            quantity,
        }
    }
}

/// Player inventory, one entry per distinct item in the order first acquired
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add items, stacking onto an existing entry
    pub fn add_item(&mut self, item_id: &str, quantity: i32) {
        if quantity <= 0 {
            return;
        }

        match self.entries.iter_mut().find(|e| e.item_id == item_id) {
            Some(entry) => entry.quantity = entry.quantity.saturating_add(quantity),
            None => self.entries.push(InventoryEntry::new(item_id, quantity)),
        }
    }

    /// Remove items. Returns false and leaves the inventory untouched if
    /// fewer than `quantity` are held.
    pub fn remove_item(&mut self, item_id: &str, quantity: i32) -> bool {
        if quantity <= 0 {
            return false;
        }

        let Some(index) = self.entries.iter().position(|e| e.item_id == item_id) else {
            return false;
        };

        let entry = &mut self.entries[index];
        if entry.quantity < quantity {
            return false;
        }

        entry.quantity -= quantity;
        if entry.quantity == 0 {
            self.entries.remove(index);
        }
        true
    }

    pub fn quantity_of(&self, item_id: &str) -> i32 {
        self.entries
            .iter()
            .find(|e| e.item_id == item_id)
            .map(|e| e.quantity)
            .unwrap_or(0)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.quantity_of(item_id) > 0
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_stacks() {
        let mut inventory = Inventory::new();
        inventory.add_item("chicken_food", 2);
        inventory.add_item("bone_toy", 1);
        inventory.add_item("chicken_food", 3);

        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.quantity_of("chicken_food"), 5);
        assert_eq!(inventory.entries()[1], InventoryEntry::new("bone_toy", 1));
    }

    #[test]
    fn test_add_item_saturates() {
        let mut inventory = Inventory::new();
        inventory.add_item("chicken_food", i32::MAX - 1);
        inventory.add_item("chicken_food", 5);
        assert_eq!(inventory.quantity_of("chicken_food"), i32::MAX);
    }

    #[test]
    fn test_add_non_positive_is_ignored() {
        let mut inventory = Inventory::new();
        inventory.add_item("chicken_food", 0);
        inventory.add_item("chicken_food", -4);
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_remove_item() {
        let mut inventory = Inventory::new();
        inventory.add_item("chicken_food", 2);

        assert!(!inventory.remove_item("chicken_food", 3));
        assert_eq!(inventory.quantity_of("chicken_food"), 2);

        assert!(inventory.remove_item("chicken_food", 1));
        assert!(inventory.contains("chicken_food"));

        assert!(inventory.remove_item("chicken_food", 1));
        assert!(!inventory.contains("chicken_food"));
        assert!(inventory.is_empty());

        assert!(!inventory.remove_item("bone_toy", 1));
    }
}
