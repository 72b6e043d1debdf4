//! Stock resolver: balances and alert state per item
//!
//! Movements are matched to items by normalized name across every log.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use shared::{
    classify_stock, days_until_stockout, normalize_item_name, MovementRole, StockAlertLevel, StockPosition,
    DEFAULT_USAGE_WINDOW_DAYS,
};

use crate::clock::Clock;
use crate::services::ledger::LedgerStore;

#[derive(Clone)]
pub struct StockResolver {
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    usage_window_days: u32,
}

/// IN and OUT sums for one item
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StockTotals {
    pub total_in: Decimal,
    pub total_out: Decimal,
}

impl StockTotals {
    pub fn balance(&self) -> Decimal {
        self.total_in - self.total_out
    }
}

impl StockResolver {
    pub fn new(store: Arc<LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            usage_window_days: DEFAULT_USAGE_WINDOW_DAYS,
        }
    }

    /// Override the trailing window used for the stockout horizon
    pub fn with_usage_window(mut self, days: u32) -> Self {
        self.usage_window_days = days;
        self
    }

    pub fn usage_window_days(&self) -> u32 {
        self.usage_window_days
    }

    /// IN and OUT sums for `item_name`, optionally up to and including `as_of`
    pub fn totals(&self, item_name: &str, as_of: Option<NaiveDate>) -> StockTotals {
        let key = normalize_item_name(item_name);
        let view = self.store.view();

        view.iter()
            .filter(|m| as_of.map_or(true, |limit| m.date <= limit))
            .filter(|m| m.item_key() == key)
            .fold(StockTotals::default(), |mut acc, m| {
                match m.role {
                    MovementRole::In => acc.total_in += m.quantity,
                    MovementRole::Out => acc.total_out += m.quantity,
                }
                acc
            })
    }

    /// Sum of IN minus sum of OUT. May be negative.
    pub fn balance_of(&self, item_name: &str, as_of: Option<NaiveDate>) -> Decimal {
        self.totals(item_name, as_of).balance()
    }

    /// OUT quantity over the trailing `window_days` (today included), per day
    pub fn average_daily_usage(&self, item_name: &str, window_days: u32) -> Decimal {
        if window_days == 0 {
            return Decimal::ZERO;
        }

        let key = normalize_item_name(item_name);
        let today = self.clock.today();
        let window_start = today - Duration::days(i64::from(window_days));

        let used: Decimal = self
            .store
            .view()
            .iter()
            .filter(|m| m.role == MovementRole::Out)
            .filter(|m| m.date > window_start && m.date <= today)
            .filter(|m| m.item_key() == key)
            .map(|m| m.quantity)
            .sum();

        used / Decimal::from(window_days)
    }

    /// Days of stock left at recent usage, or the sentinel when there is none
    pub fn days_until_stockout(&self, item_name: &str) -> Decimal {
        let balance = self.balance_of(item_name, None);
        let usage = self.average_daily_usage(item_name, self.usage_window_days);
        days_until_stockout(balance, usage)
    }

    pub fn classify(&self, item_name: &str) -> StockAlertLevel {
        let balance = self.balance_of(item_name, None);
        let usage = self.average_daily_usage(item_name, self.usage_window_days);
        classify_stock(balance, usage)
    }

    /// Everything known about one item's stock in a single pass
    pub fn position(&self, item_name: &str) -> StockPosition {
        let totals = self.totals(item_name, None);
        let balance = totals.balance();
        let usage = self.average_daily_usage(item_name, self.usage_window_days);

        StockPosition {
            item_name: item_name.trim().to_string(),
            total_in: totals.total_in,
            total_out: totals.total_out,
            balance,
            average_daily_usage: usage,
            days_until_stockout: days_until_stockout(balance, usage),
            level: classify_stock(balance, usage),
        }
    }

    /// Alerting items only, most urgent first, then by name
    pub fn alerts<I, S>(&self, item_names: I) -> Vec<StockPosition>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positions: Vec<_> = item_names
            .into_iter()
            .map(|name| self.position(name.as_ref()))
            .filter(|p| p.level.is_alert())
            .collect();

        positions.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| normalize_item_name(&a.item_name).cmp(&normalize_item_name(&b.item_name)))
        });
        positions
    }
}
