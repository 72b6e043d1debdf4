//! Ledger movement models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::normalize_item_name;

/// Direction of a movement relative to stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementRole {
    In,
    Out,
}

impl MovementRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementRole::In => "IN",
            MovementRole::Out => "OUT",
        }
    }

    /// Sign applied to a quantity when summing a balance
    pub fn sign(&self) -> Decimal {
        match self {
            MovementRole::In => Decimal::ONE,
            MovementRole::Out => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::str::FromStr for MovementRole {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" | "in" => Ok(MovementRole::In),
            "OUT" | "out" => Ok(MovementRole::Out),
            _ => Err("Unknown movement role"),
        }
    }
}

/// What produced a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    GoodsReceived,
    StoreConsumption,
    ProductionIn,
    /// Raw material consumption derived from a batched output entry
    ProductionOut,
    FinishedGoodsOutput,
    Dispatch,
    SparePartsPurchase,
    SparePartsConsumption,
}

impl MovementKind {
    pub const ALL: [MovementKind; 8] = [
        MovementKind::GoodsReceived,
        MovementKind::StoreConsumption,
        MovementKind::ProductionIn,
        MovementKind::ProductionOut,
        MovementKind::FinishedGoodsOutput,
        MovementKind::Dispatch,
        MovementKind::SparePartsPurchase,
        MovementKind::SparePartsConsumption,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::GoodsReceived => "goods_received",
            MovementKind::StoreConsumption => "store_consumption",
            MovementKind::ProductionIn => "production_in",
            MovementKind::ProductionOut => "production_out",
            MovementKind::FinishedGoodsOutput => "finished_goods_output",
            MovementKind::Dispatch => "dispatch",
            MovementKind::SparePartsPurchase => "spare_parts_purchase",
            MovementKind::SparePartsConsumption => "spare_parts_consumption",
        }
    }

    pub fn role(&self) -> MovementRole {
        match self {
            MovementKind::GoodsReceived
            | MovementKind::ProductionIn
            | MovementKind::FinishedGoodsOutput
            | MovementKind::SparePartsPurchase => MovementRole::In,
            MovementKind::StoreConsumption
            | MovementKind::ProductionOut
            | MovementKind::Dispatch
            | MovementKind::SparePartsConsumption => MovementRole::Out,
        }
    }

    /// Log a movement of this kind is written to
    pub fn log(&self) -> LedgerLog {
        match self {
            MovementKind::GoodsReceived => LedgerLog::Receipts,
            MovementKind::StoreConsumption | MovementKind::ProductionOut => LedgerLog::Consumption,
            MovementKind::ProductionIn => LedgerLog::ProductionIn,
            MovementKind::FinishedGoodsOutput => LedgerLog::FinishedGoods,
            MovementKind::Dispatch => LedgerLog::Dispatch,
            MovementKind::SparePartsPurchase => LedgerLog::SparePartsIn,
            MovementKind::SparePartsConsumption => LedgerLog::SparePartsOut,
        }
    }
}

impl std::str::FromStr for MovementKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or("Unknown movement kind")
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementKind::GoodsReceived => write!(f, "Goods Received"),
            MovementKind::StoreConsumption => write!(f, "Store Consumption"),
            MovementKind::ProductionIn => write!(f, "Production In"),
            MovementKind::ProductionOut => write!(f, "Production Out (auto-deducted)"),
            MovementKind::FinishedGoodsOutput => write!(f, "Finished Goods Output"),
            MovementKind::Dispatch => write!(f, "Dispatch"),
            MovementKind::SparePartsPurchase => write!(f, "Spare Parts Purchase"),
            MovementKind::SparePartsConsumption => write!(f, "Spare Parts Consumption"),
        }
    }
}

/// Named movement logs, one per input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerLog {
    Receipts,
    Consumption,
    ProductionIn,
    FinishedGoods,
    Dispatch,
    SparePartsIn,
    SparePartsOut,
}

impl LedgerLog {
    pub const ALL: [LedgerLog; 7] = [
        LedgerLog::Receipts,
        LedgerLog::Consumption,
        LedgerLog::ProductionIn,
        LedgerLog::FinishedGoods,
        LedgerLog::Dispatch,
        LedgerLog::SparePartsIn,
        LedgerLog::SparePartsOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerLog::Receipts => "receipts",
            LedgerLog::Consumption => "consumption",
            LedgerLog::ProductionIn => "production_in",
            LedgerLog::FinishedGoods => "finished_goods",
            LedgerLog::Dispatch => "dispatch",
            LedgerLog::SparePartsIn => "spare_parts_in",
            LedgerLog::SparePartsOut => "spare_parts_out",
        }
    }

    /// Whether movements of `kind` belong in this log
    pub fn accepts(&self, kind: MovementKind) -> bool {
        kind.log() == *self
    }
}

impl std::str::FromStr for LedgerLog {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedgerLog::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or("Unknown ledger log")
    }
}

impl std::fmt::Display for LedgerLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlates the movements written by one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionGroupId(pub Uuid);

impl TransactionGroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionGroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable quantity fact against an item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movement {
    pub id: Uuid,
    pub log: LedgerLog,
    /// Monotonic within `log`, never reused after a delete
    pub sequence: i64,
    pub item_id: Option<Uuid>,
    pub item_name: String,
    pub role: MovementRole,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub unit: String,
    pub date: NaiveDate,
    pub transaction_group_id: Option<TransactionGroupId>,
    pub batch_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Build the stored record for `input` at the given position in `log`
    pub fn from_new(input: NewMovement, log: LedgerLog, sequence: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            log,
            sequence,
            item_id: input.item_id,
            item_name: input.item_name,
            role: input.kind.role(),
            kind: input.kind,
            quantity: input.quantity,
            unit: input.unit,
            date: input.date,
            transaction_group_id: input.transaction_group_id,
            batch_id: input.batch_id,
            notes: input.notes,
            created_at,
        }
    }

    pub fn item_key(&self) -> String {
        normalize_item_name(&self.item_name)
    }

    /// Quantity with the role's sign applied
    pub fn signed_quantity(&self) -> Decimal {
        self.role.sign() * self.quantity
    }

    pub fn in_group(&self, group: TransactionGroupId) -> bool {
        self.transaction_group_id == Some(group)
    }
}

/// A movement to be appended; the store assigns id, log position and role
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMovement {
    pub item_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub item_name: String,
    pub kind: MovementKind,
    #[validate(custom = "validate_non_negative_quantity")]
    pub quantity: Decimal,
    #[validate(length(min = 1, message = "Unit is required"))]
    pub unit: String,
    pub date: NaiveDate,
    pub transaction_group_id: Option<TransactionGroupId>,
    pub batch_id: Option<String>,
    pub notes: Option<String>,
}

impl NewMovement {
    pub fn new(item_name: impl Into<String>, kind: MovementKind, quantity: Decimal, date: NaiveDate) -> Self {
        Self {
            item_id: None,
            item_name: item_name.into(),
            kind,
            quantity,
            unit: crate::DEFAULT_UNIT.to_string(),
            date,
            transaction_group_id: None,
            batch_id: None,
            notes: None,
        }
    }

    pub fn with_item_id(mut self, item_id: Uuid) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn with_group(mut self, group: TransactionGroupId) -> Self {
        self.transaction_group_id = Some(group);
        self
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

fn validate_non_negative_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if quantity.is_sign_negative() && !quantity.is_zero() {
        let mut err = ValidationError::new("negative_quantity");
        err.message = Some("Quantity cannot be negative".into());
        return Err(err);
    }
    Ok(())
}
