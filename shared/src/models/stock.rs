//! Stock position and alert models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Days reported when there is no recent usage
pub const STOCKOUT_SENTINEL_DAYS: i64 = 999;

/// Stockout horizon below which an item is a warning
pub const WARNING_HORIZON_DAYS: i64 = 7;

/// Balance above this many days of usage is overstock
pub const OVERSTOCK_USAGE_DAYS: i64 = 90;

/// Trailing window used for the stockout horizon
pub const DEFAULT_USAGE_WINDOW_DAYS: u32 = 30;

/// Alert level of an item. Ordering is alert priority: critical sorts first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockAlertLevel {
    Critical,
    Warning,
    Overstock,
    Normal,
}

impl StockAlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAlertLevel::Critical => "critical",
            StockAlertLevel::Warning => "warning",
            StockAlertLevel::Overstock => "overstock",
            StockAlertLevel::Normal => "normal",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, StockAlertLevel::Normal)
    }
}

impl std::fmt::Display for StockAlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockAlertLevel::Critical => write!(f, "Critical"),
            StockAlertLevel::Warning => write!(f, "Warning"),
            StockAlertLevel::Overstock => write!(f, "Overstock"),
            StockAlertLevel::Normal => write!(f, "Normal"),
        }
    }
}

/// Derived stock position for one item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockPosition {
    pub item_name: String,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub balance: Decimal,
    pub average_daily_usage: Decimal,
    pub days_until_stockout: Decimal,
    pub level: StockAlertLevel,
}

/// Balance divided by daily usage, or the sentinel when usage is zero.
///
/// Saturates at `Decimal::MAX` / `Decimal::MIN` when the quotient does not
/// fit, which happens for a large balance against a tiny usage.
pub fn days_until_stockout(balance: Decimal, average_daily_usage: Decimal) -> Decimal {
    if average_daily_usage <= Decimal::ZERO {
        return Decimal::from(STOCKOUT_SENTINEL_DAYS);
    }
    balance.checked_div(average_daily_usage).unwrap_or(if balance.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

/// Classify an item from its balance and average daily usage.
///
/// Overstock is `balance > 90 x usage`, so an idle item holding any stock
/// is overstock.
pub fn classify_stock(balance: Decimal, average_daily_usage: Decimal) -> StockAlertLevel {
    if balance <= Decimal::ZERO {
        return StockAlertLevel::Critical;
    }
    let days = days_until_stockout(balance, average_daily_usage);
    if days > Decimal::ZERO && days < Decimal::from(WARNING_HORIZON_DAYS) {
        return StockAlertLevel::Warning;
    }
    let overstock_line = Decimal::from(OVERSTOCK_USAGE_DAYS)
        .checked_mul(average_daily_usage)
        .unwrap_or(Decimal::MAX);
    if balance > overstock_line {
        return StockAlertLevel::Overstock;
    }
    StockAlertLevel::Normal
}
