pub mod definition;
pub mod registry;

pub use definition::{MismatchedStockLists, Shop, ShopStockItem, ShopTemplate};
pub use registry::ShopRegistry;
