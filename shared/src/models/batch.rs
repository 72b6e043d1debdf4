//! Production batch models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a production batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Planned,
    InProduction,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Planned => "planned",
            BatchStatus::InProduction => "in_production",
            BatchStatus::Completed => "completed",
        }
    }

    /// Planned -> In Production -> Completed, nothing else
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Planned, BatchStatus::InProduction)
                | (BatchStatus::InProduction, BatchStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed)
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(BatchStatus::Planned),
            "in_production" => Ok(BatchStatus::InProduction),
            "completed" => Ok(BatchStatus::Completed),
            _ => Err("Unknown batch status"),
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Planned => write!(f, "Planned"),
            BatchStatus::InProduction => write!(f, "In Production"),
            BatchStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Frozen requirement line stored on a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientRequirement {
    pub item_name: String,
    pub required_qty: Decimal,
}

/// One planned production run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionBatch {
    /// Human-readable id, e.g. "B-20240601-003"
    pub id: String,
    pub formulation_id: Uuid,
    pub formulation_name: String,
    pub output_item: String,
    pub target_quantity: Decimal,
    pub status: BatchStatus,
    /// Snapshot taken at planning time; never follows later formulation edits
    pub requirements: Vec<IngredientRequirement>,
    /// Percentage with one decimal, set on completion
    pub actual_yield: Option<String>,
    pub planned_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProductionBatch {
    /// Move to `next`, rejecting anything outside the lifecycle
    pub fn transition(&mut self, next: BatchStatus) -> Result<(), &'static str> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err("Batch status transition not allowed");
        }
        self.status = next;
        Ok(())
    }

    pub fn requirement_for(&self, item_name: &str) -> Option<&IngredientRequirement> {
        self.requirements
            .iter()
            .find(|r| super::same_item(&r.item_name, item_name))
    }
}

/// Generate a batch id from the planning date and the day's sequence
pub fn generate_batch_id(date: NaiveDate, sequence: u32) -> String {
    format!("B-{}-{:03}", date.format("%Y%m%d"), sequence)
}
