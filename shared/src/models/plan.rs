//! Material requirement plans

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Formulation, IngredientRequirement};

/// Requirement and stock check for one ingredient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientPlan {
    pub item_name: String,
    pub quantity_per_unit: Decimal,
    pub required_qty: Decimal,
    pub current_stock: Decimal,
    pub shortage: Decimal,
    pub sufficient: bool,
    /// Informational only; not a pass/fail signal
    pub is_zero_requirement: bool,
}

/// Per-ingredient breakdown for a formulation at a target quantity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialPlan {
    pub formulation_id: Uuid,
    pub formulation_name: String,
    pub output_item: String,
    pub output_unit: String,
    pub target_quantity: Decimal,
    pub requirements: Vec<IngredientPlan>,
}

impl MaterialPlan {
    /// True when every ingredient is covered by current stock
    pub fn is_feasible(&self) -> bool {
        self.requirements.iter().all(|r| r.sufficient)
    }

    pub fn shortages(&self) -> impl Iterator<Item = &IngredientPlan> {
        self.requirements.iter().filter(|r| !r.sufficient)
    }

    pub fn total_required(&self) -> Decimal {
        self.requirements.iter().map(|r| r.required_qty).sum()
    }

    /// Deep copy of the requirement lines for a batch snapshot
    pub fn frozen_requirements(&self) -> Vec<IngredientRequirement> {
        self.requirements
            .iter()
            .map(|r| IngredientRequirement {
                item_name: r.item_name.clone(),
                required_qty: r.required_qty,
            })
            .collect()
    }
}

/// Compute one requirement line.
///
/// A non-positive target yields a zero requirement.
pub fn plan_ingredient(
    item_name: &str,
    quantity_per_unit: Decimal,
    target_quantity: Decimal,
    current_stock: Decimal,
) -> IngredientPlan {
    let target = target_quantity.max(Decimal::ZERO);
    let required_qty = quantity_per_unit.checked_mul(target).unwrap_or(Decimal::MAX);
    IngredientPlan {
        item_name: item_name.to_string(),
        quantity_per_unit,
        required_qty,
        current_stock,
        shortage: required_qty
            .checked_sub(current_stock)
            .unwrap_or(Decimal::MAX)
            .max(Decimal::ZERO),
        sufficient: current_stock >= required_qty,
        is_zero_requirement: required_qty.is_zero(),
    }
}

/// Build the full plan, reading each ingredient's stock through `stock_of`
pub fn build_material_plan<F>(formulation: &Formulation, target_quantity: Decimal, stock_of: F) -> MaterialPlan
where
    F: Fn(&str) -> Decimal,
{
    let requirements = formulation
        .ingredients
        .iter()
        .map(|ing| {
            plan_ingredient(
                &ing.item_name,
                ing.quantity_per_unit,
                target_quantity,
                stock_of(&ing.item_name),
            )
        })
        .collect();

    MaterialPlan {
        formulation_id: formulation.id,
        formulation_name: formulation.name.clone(),
        output_item: formulation.output_item.clone(),
        output_unit: formulation.output_unit.clone(),
        target_quantity,
        requirements,
    }
}
