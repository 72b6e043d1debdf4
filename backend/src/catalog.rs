//! Item catalog and formulation store collaborators
//!
//! Both are owned by other parts of the application; the ledger only reads
//! them. The in-memory versions back tests and the operator binary.

use std::collections::HashMap;
use std::sync::RwLock;

use shared::{normalize_item_name, Formulation, Item};
use uuid::Uuid;

/// Source of valid item names and categories
pub trait ItemCatalog: Send + Sync {
    fn list_items(&self) -> Vec<Item>;

    /// Look up an item by normalized name
    fn find_item(&self, name: &str) -> Option<Item> {
        let key = normalize_item_name(name);
        self.list_items().into_iter().find(|item| item.key() == key)
    }
}

/// Source of named recipes
pub trait FormulationStore: Send + Sync {
    fn get_formulation(&self, id: Uuid) -> Option<Formulation>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: RwLock<Vec<Item>>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub fn add_item(&self, item: Item) {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(item);
    }
}

impl ItemCatalog for InMemoryCatalog {
    fn list_items(&self) -> Vec<Item> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFormulations {
    formulations: RwLock<HashMap<Uuid, Formulation>>,
}

impl InMemoryFormulations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a formulation
    pub fn upsert(&self, formulation: Formulation) {
        self.formulations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(formulation.id, formulation);
    }
}

impl FormulationStore for InMemoryFormulations {
    fn get_formulation(&self, id: Uuid) -> Option<Formulation> {
        self.formulations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}
