pub mod item_def;
pub mod item_registry;
pub mod watcher;

pub use item_def::{item_key, CarePoints, ItemDefinition, ItemType};
pub use item_registry::ItemRegistry;
pub use watcher::{DataReloadEvent, GameData, SharedGameData};
