//! Buying from and selling to shops.
//!
//! Every check runs before any state changes, so a failed trade leaves the
//! player and the shop exactly as they were.

use serde::Serialize;

use crate::data::ItemRegistry;
use crate::game::Player;
use crate::shop::Shop;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("Invalid quantity")]
    InvalidQuantity,
    #[error("Item not found")]
    UnknownItem,
    #[error("Item not sold here")]
    NotStocked,
    #[error("Insufficient stock")]
    InsufficientStock,
    #[error("Not enough money")]
    NotEnoughMoney,
    #[error("Item not in inventory")]
    NotInInventory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub item_id: String,
    pub quantity: i32,
    pub unit_price: i32,
    pub total: i32,
    pub money_left: i32,
}

/// Buy `quantity` of an item from a shop at the shop's price
pub fn buy(
    player: &mut Player,
    shop: &mut Shop,
    catalogue: &ItemRegistry,
    item_id: &str,
    quantity: i32,
) -> Result<Receipt, TradeError> {
    if quantity <= 0 {
        return Err(TradeError::InvalidQuantity);
    }
    if !catalogue.contains(item_id) {
        return Err(TradeError::UnknownItem);
    }

    let stock = shop.get_stock(item_id).ok_or(TradeError::NotStocked)?;
    if stock.quantity < quantity {
        return Err(TradeError::InsufficientStock);
    }

    let unit_price = stock.price;
    let total = unit_price
        .checked_mul(quantity)
        .ok_or(TradeError::NotEnoughMoney)?;
    if !player.spend(total) {
        return Err(TradeError::NotEnoughMoney);
    }

    // Sold-out items leave the shop
    shop.change_item_quantity(item_id, -quantity);
    player.inventory.add_item(item_id, quantity);

    Ok(Receipt {
        item_id: item_id.to_string(),
        quantity,
        unit_price,
        total,
        money_left: player.money,
    })
}

/// Sell `quantity` of an item back to a shop for a fraction of its catalogue price
pub fn sell(
    player: &mut Player,
    shop: &mut Shop,
    catalogue: &ItemRegistry,
    item_id: &str,
    quantity: i32,
    multiplier: f32,
) -> Result<Receipt, TradeError> {
    if quantity <= 0 {
        return Err(TradeError::InvalidQuantity);
    }

    let item = catalogue.get(item_id).ok_or(TradeError::UnknownItem)?;
    if player.inventory.quantity_of(item_id) < quantity {
        return Err(TradeError::NotInInventory);
    }

    let unit_price = ((item.price as f32 * multiplier).floor() as i32).max(1);
    let total = unit_price.saturating_mul(quantity);

    player.inventory.remove_item(item_id, quantity);
    player.earn(total);

    if shop.contains(item_id) {
        shop.change_item_quantity(item_id, quantity);
    } else {
        shop.add_item(item, quantity);
    }

    Ok(Receipt {
        item_id: item_id.to_string(),
        quantity,
        unit_price,
        total,
        money_left: player.money,
    })
}
