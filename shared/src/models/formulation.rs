//! Formulation (recipe) models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named recipe: ingredients required per one unit of output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Formulation {
    pub id: Uuid,
    pub name: String,
    pub output_item: String,
    pub output_unit: String,
    /// Ordered as entered
    pub ingredients: Vec<FormulationIngredient>,
}

/// One ingredient line of a formulation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormulationIngredient {
    pub item_name: String,
    pub quantity_per_unit: Decimal,
}

impl Formulation {
    pub fn new(name: impl Into<String>, output_item: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            output_item: output_item.into(),
            output_unit: crate::DEFAULT_UNIT.to_string(),
            ingredients: Vec::new(),
        }
    }

    pub fn with_ingredient(mut self, item_name: impl Into<String>, quantity_per_unit: Decimal) -> Self {
        self.ingredients.push(FormulationIngredient {
            item_name: item_name.into(),
            quantity_per_unit,
        });
        self
    }

    /// Sum of all ingredient quantities for one output unit
    pub fn total_per_unit(&self) -> Decimal {
        self.ingredients.iter().map(|i| i.quantity_per_unit).sum()
    }
}
