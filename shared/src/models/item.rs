//! Item catalog models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named product, raw material or spare part
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub category: ItemCategory,
}

impl Item {
    pub fn new(name: impl Into<String>, category: ItemCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
        }
    }

    /// Ledger identity of this item (see [`normalize_item_name`])
    pub fn key(&self) -> String {
        normalize_item_name(&self.name)
    }
}

/// Item categories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    RawMaterial,
    FinishedGood,
    Packing,
    SparePart,
    Custom(String),
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemCategory::RawMaterial => write!(f, "Raw Material"),
            ItemCategory::FinishedGood => write!(f, "Finished Good"),
            ItemCategory::Packing => write!(f, "Packing Material"),
            ItemCategory::SparePart => write!(f, "Spare Part"),
            ItemCategory::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Normalize an item name for ledger matching.
///
/// Movements are joined to items by this key, not by id, so renaming an item
/// detaches its history. Movements also carry the item id when it is known.
pub fn normalize_item_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether two display names refer to the same ledger item
pub fn same_item(a: &str, b: &str) -> bool {
    normalize_item_name(a) == normalize_item_name(b)
}
