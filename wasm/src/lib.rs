//! WebAssembly module for the Agarbatti ERP ledger
//!
//! Provides client-side computation for:
//! - Material plans while a target quantity is being typed
//! - Packed quantity mismatch and batch completion checks
//! - Stock alert classification
//! - Offline entry validation

use std::collections::HashMap;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&"agarbatti ledger wasm ready".into());
}

fn js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

/// Convert a JavaScript number to a decimal quantity.
///
/// NaN, the infinities and values outside the decimal range are rejected.
pub fn parse_quantity(value: f64) -> Result<Decimal, String> {
    if !value.is_finite() {
        return Err(format!("Quantity must be a finite number, got {}", value));
    }
    Decimal::try_from(value).map_err(|e| format!("Quantity {} is out of range: {}", value, e))
}

fn quantity(value: f64) -> Result<Decimal, JsValue> {
    parse_quantity(value).map_err(js_error)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_string().parse().unwrap_or(0.0)
}

/// Material plan as JSON, with errors as plain messages.
pub fn material_plan(formulation_json: &str, target_quantity: f64, stock_json: &str) -> Result<String, String> {
    let formulation: Formulation =
        serde_json::from_str(formulation_json).map_err(|e| format!("Invalid formulation JSON: {}", e))?;
    let stock: HashMap<String, Decimal> =
        serde_json::from_str(stock_json).map_err(|e| format!("Invalid stock JSON: {}", e))?;
    let target = parse_quantity(target_quantity)?;

    let by_key: HashMap<String, Decimal> = stock
        .into_iter()
        .map(|(name, qty)| (normalize_item_name(&name), qty))
        .collect();

    let plan = build_material_plan(&formulation, target, |name| {
        by_key.get(&normalize_item_name(name)).copied().unwrap_or_default()
    });

    serde_json::to_string(&plan).map_err(|e| format!("Failed to serialize plan: {}", e))
}

/// Calculate the material plan for a formulation.
///
/// `stock_json` maps item names to current stock; names are matched
/// case-insensitively and missing items count as zero.
#[wasm_bindgen]
pub fn calculate_material_plan(formulation_json: &str, target_quantity: f64, stock_json: &str) -> Result<String, JsValue> {
    material_plan(formulation_json, target_quantity, stock_json).map_err(js_error)
}

/// True when the packed quantity needs the operator to confirm it
#[wasm_bindgen]
pub fn check_quantity_mismatch(packed_kg: f64, target_kg: f64) -> Result<bool, JsValue> {
    Ok(is_quantity_mismatch(quantity(packed_kg)?, quantity(target_kg)?))
}

/// Share of each frozen requirement deducted for one output entry
#[wasm_bindgen]
pub fn calculate_deduction_ratio(packed_kg: f64, target_kg: f64) -> Result<f64, JsValue> {
    Ok(to_f64(deduction_ratio(quantity(packed_kg)?, quantity(target_kg)?)))
}

/// True when cumulative output has reached the completion threshold
#[wasm_bindgen]
pub fn check_completion(cumulative_output_kg: f64, target_kg: f64) -> Result<bool, JsValue> {
    Ok(is_completion_eligible(quantity(cumulative_output_kg)?, quantity(target_kg)?))
}

/// Batch yield formatted with one decimal, e.g. "98.5"
#[wasm_bindgen]
pub fn format_batch_yield(cumulative_output_kg: f64, target_kg: f64) -> Result<String, JsValue> {
    Ok(format_yield(yield_percent(quantity(cumulative_output_kg)?, quantity(target_kg)?)))
}

/// Classify stock from balance and average daily usage
#[wasm_bindgen]
pub fn classify_stock_level(balance: f64, average_daily_usage: f64) -> Result<String, JsValue> {
    Ok(classify_stock(quantity(balance)?, quantity(average_daily_usage)?)
        .as_str()
        .to_string())
}

/// Days of stock left at the given usage, 999 when there is no usage
#[wasm_bindgen]
pub fn calculate_days_until_stockout(balance: f64, average_daily_usage: f64) -> Result<f64, JsValue> {
    Ok(to_f64(days_until_stockout(quantity(balance)?, quantity(average_daily_usage)?)))
}

/// Validate a formulation before saving it; returns the problem, if any
#[wasm_bindgen]
pub fn validate_formulation_json(formulation_json: &str) -> Result<Option<String>, JsValue> {
    let formulation: Formulation = serde_json::from_str(formulation_json)
        .map_err(|e| js_error(format!("Invalid formulation JSON: {}", e)))?;
    Ok(validate_formulation(&formulation).err().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_mismatch() {
        assert!(!check_quantity_mismatch(100.009, 100.0).unwrap());
        assert!(check_quantity_mismatch(100.02, 100.0).unwrap());
        assert!(check_quantity_mismatch(90.0, 100.0).unwrap());
    }

    #[test]
    fn test_completion() {
        assert!(!check_completion(489.999, 500.0).unwrap());
        assert!(check_completion(490.0, 500.0).unwrap());
        assert!(!check_completion(10.0, 0.0).unwrap());
    }

    #[test]
    fn test_deduction_ratio() {
        assert!((calculate_deduction_ratio(50.0, 200.0).unwrap() - 0.25).abs() < 0.0001);
        assert_eq!(calculate_deduction_ratio(50.0, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_format_batch_yield() {
        assert_eq!(format_batch_yield(100.0, 100.0).unwrap(), "100.0");
        assert_eq!(format_batch_yield(197.0, 200.0).unwrap(), "98.5");
    }

    #[test]
    fn test_classify_stock_level() {
        assert_eq!(classify_stock_level(0.0, 1.0).unwrap(), "critical");
        assert_eq!(classify_stock_level(5.0, 1.0).unwrap(), "warning");
        assert_eq!(classify_stock_level(50.0, 1.0).unwrap(), "normal");
        assert_eq!(classify_stock_level(100.0, 1.0).unwrap(), "overstock");
        assert_eq!(classify_stock_level(10.0, 0.0).unwrap(), "overstock");
        assert_eq!(calculate_days_until_stockout(10.0, 0.0).unwrap(), 999.0);
    }

    #[test]
    fn test_parse_quantity_rejects_non_finite_numbers() {
        assert!(parse_quantity(f64::NAN).is_err());
        assert!(parse_quantity(f64::INFINITY).is_err());
        assert!(parse_quantity(f64::NEG_INFINITY).is_err());
        assert!(parse_quantity(1e30).is_err());
        assert_eq!(parse_quantity(12.5).unwrap(), Decimal::new(125, 1));
    }

    #[test]
    fn test_material_plan() {
        let formulation = Formulation::new("Masala Base", "Raw Agarbatti")
            .with_ingredient("Charcoal", Decimal::new(4, 1))
            .with_ingredient("Jigat", Decimal::new(2, 1));
        let json = serde_json::to_string(&formulation).unwrap();

        let plan_json = calculate_material_plan(&json, 100.0, r#"{"charcoal": "30", "Jigat": 50}"#).unwrap();
        let plan: MaterialPlan = serde_json::from_str(&plan_json).unwrap();

        assert_eq!(plan.requirements[0].shortage, Decimal::from(10));
        assert!(plan.requirements[1].sufficient);
    }

    #[test]
    fn test_material_plan_rejects_nan_target() {
        let formulation = Formulation::new("Masala Base", "Raw Agarbatti").with_ingredient("Charcoal", Decimal::new(4, 1));
        let json = serde_json::to_string(&formulation).unwrap();

        let err = material_plan(&json, f64::NAN, "{}").unwrap_err();
        assert!(err.contains("finite"));
    }
}
