use serde::{Deserialize, Serialize};

// ============================================================================
// Item Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(alias = "food")]
    Food,
    #[serde(alias = "drink")]
    Drink,
    #[serde(alias = "toy")]
    Toy,
    #[serde(alias = "medicine")]
    Medicine,
    #[serde(alias = "treat")]
    Treat,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Food => "Food",
            ItemType::Drink => "Drink",
            ItemType::Toy => "Toy",
            ItemType::Medicine => "Medicine",
            ItemType::Treat => "Treat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "food" => Some(ItemType::Food),
            "drink" => Some(ItemType::Drink),
            "toy" => Some(ItemType::Toy),
            "medicine" => Some(ItemType::Medicine),
            "treat" => Some(ItemType::Treat),
            _ => None,
        }
    }
}

// ============================================================================
// Care Points
// ============================================================================

/// Need deltas applied to a pet when an item is used on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarePoints {
    pub happiness: i32,
    pub hunger: i32,
    pub thirst: i32,
    pub health: i32,
}

impl CarePoints {
    pub fn new(happiness: i32, hunger: i32, thirst: i32, health: i32) -> Self {
        Self { happiness, hunger, thirst, health }
    }
}

// ============================================================================
// Raw Item Definition (direct from TOML)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawItemDefinition {
    pub name: Option<String>,
    pub item_type: ItemType,
    pub price: Option<i32>,
    #[serde(default)]
    pub care_points: CarePoints,
    pub description: Option<String>,
    pub sprite: Option<String>,
}

// ============================================================================
// Resolved Item Definition
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    pub item_type: ItemType,
    pub price: i32,
    pub care_points: CarePoints,
    pub description: String,
    pub sprite: String,
}

/// Key for an item: lowercased name and type joined by `_`, whitespace removed.
/// `("Squeaky Mouse", Toy)` becomes `squeakymouse_toy`.
pub fn item_key(name: &str, item_type: ItemType) -> String {
    format!("{}_{}", name, item_type.as_str())
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

impl ItemDefinition {
    pub fn from_raw(id: &str, raw: &RawItemDefinition) -> Self {
        let name = raw.name.clone().unwrap_or_else(|| id.to_string());
        Self {
            id: id.to_string(),
            sprite: raw.sprite.clone()
                .unwrap_or_else(|| item_key(&name, raw.item_type)),
            name,
            item_type: raw.item_type,
            price: raw.price.unwrap_or(1).max(0),
            care_points: raw.care_points,
            description: raw.description.clone()
                .unwrap_or_default(),
        }
    }

    /// Build a definition directly, keyed by `item_key`
    pub fn new(name: &str, item_type: ItemType, price: i32, care_points: CarePoints) -> Self {
        let id = item_key(name, item_type);
        Self {
            sprite: id.clone(),
            id,
            name: name.to_string(),
            item_type,
            price,
            care_points,
            description: String::new(),
        }
    }

    /// Check if this item is identified by the given name and type
    pub fn matches(&self, name: &str, item_type: ItemType) -> bool {
        self.name == name && self.item_type == item_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_strips_whitespace() {
        assert_eq!(item_key("Squeaky Mouse", ItemType::Toy), "squeakymouse_toy");
        assert_eq!(item_key("Chicken", ItemType::Food), "chicken_food");
    }

    #[test]
    fn test_from_raw_defaults() {
        let raw: RawItemDefinition = toml::from_str(r#"item_type = "toy""#).unwrap();
        let def = ItemDefinition::from_raw("ball", &raw);

        assert_eq!(def.name, "ball");
        assert_eq!(def.item_type, ItemType::Toy);
        assert_eq!(def.price, 1);
        assert_eq!(def.care_points, CarePoints::default());
        assert_eq!(def.sprite, "ball_toy");
    }

    #[test]
    fn test_item_type_from_str() {
        assert_eq!(ItemType::from_str("FOOD"), Some(ItemType::Food));
        assert_eq!(ItemType::from_str("Drink"), Some(ItemType::Drink));
        assert_eq!(ItemType::from_str("rock"), None);
    }
}
