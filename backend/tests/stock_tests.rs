//! Stock resolver tests
//!
//! Tests for stock resolution including:
//! - Balance accuracy across logs and with an as-of date
//! - Trailing usage window and stockout horizon
//! - Alert classification and ordering

use std::str::FromStr;
use std::sync::Arc;

use agarbatti_ledger::clock::FixedClock;
use agarbatti_ledger::services::{LedgerStore, StockResolver};
use agarbatti_ledger::storage::MemoryBackend;
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{LedgerLog, MovementKind, NewMovement, StockAlertLevel, STOCKOUT_SENTINEL_DAYS};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

fn days_ago(n: i64) -> NaiveDate {
    today() - Duration::days(n)
}

async fn setup() -> (Arc<LedgerStore>, StockResolver) {
    let clock = Arc::new(FixedClock::on(today()));
    let store = Arc::new(LedgerStore::open(Arc::new(MemoryBackend::new()), clock.clone()).await.unwrap());
    let resolver = StockResolver::new(store.clone(), clock);
    (store, resolver)
}

async fn record(store: &LedgerStore, name: &str, kind: MovementKind, qty: &str, date: NaiveDate) {
    store
        .append(kind.log(), NewMovement::new(name, kind, dec(qty), date))
        .await
        .unwrap();
}

/// Receipt of `received` and 30 kg used over the last month, one kg a day
async fn stock_with_usage(store: &LedgerStore, name: &str, received: &str) {
    record(store, name, MovementKind::GoodsReceived, received, days_ago(40)).await;
    record(store, name, MovementKind::StoreConsumption, "30", days_ago(3)).await;
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_balance_across_logs() {
        let (store, resolver) = setup().await;
        record(&store, "Charcoal", MovementKind::GoodsReceived, "100", today()).await;
        record(&store, "Charcoal", MovementKind::StoreConsumption, "30", today()).await;
        record(&store, "Charcoal", MovementKind::ProductionOut, "20", today()).await;
        record(&store, "Jigat", MovementKind::GoodsReceived, "500", today()).await;

        let totals = resolver.totals("Charcoal", None);
        assert_eq!(totals.total_in, dec("100"));
        assert_eq!(totals.total_out, dec("50"));
        assert_eq!(resolver.balance_of("Charcoal", None), dec("50"));
    }

    #[tokio::test]
    async fn test_balance_matches_normalized_names() {
        let (store, resolver) = setup().await;
        record(&store, "Charcoal", MovementKind::GoodsReceived, "10", today()).await;
        record(&store, " CHARCOAL ", MovementKind::GoodsReceived, "5", today()).await;

        assert_eq!(resolver.balance_of("charcoal", None), dec("15"));
    }

    #[tokio::test]
    async fn test_balance_may_go_negative() {
        let (store, resolver) = setup().await;
        record(&store, "Jigat", MovementKind::GoodsReceived, "10", today()).await;
        record(&store, "Jigat", MovementKind::StoreConsumption, "25", today()).await;

        assert_eq!(resolver.balance_of("Jigat", None), dec("-15"));
        assert_eq!(resolver.classify("Jigat"), StockAlertLevel::Critical);
    }

    #[tokio::test]
    async fn test_balance_as_of_excludes_later_movements() {
        let (store, resolver) = setup().await;
        record(&store, "Charcoal", MovementKind::GoodsReceived, "100", days_ago(5)).await;
        record(&store, "Charcoal", MovementKind::StoreConsumption, "30", today()).await;

        assert_eq!(resolver.balance_of("Charcoal", Some(days_ago(1))), dec("100"));
        assert_eq!(resolver.balance_of("Charcoal", Some(today())), dec("70"));
        assert_eq!(resolver.balance_of("Charcoal", Some(days_ago(6))), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_unknown_item_has_zero_balance() {
        let (_store, resolver) = setup().await;

        assert_eq!(resolver.balance_of("Nothing", None), Decimal::ZERO);
        assert_eq!(resolver.classify("Nothing"), StockAlertLevel::Critical);
    }

    #[tokio::test]
    async fn test_usage_window_bounds() {
        let (store, resolver) = setup().await;
        record(&store, "Charcoal", MovementKind::GoodsReceived, "1000", days_ago(60)).await;
        record(&store, "Charcoal", MovementKind::StoreConsumption, "15", today()).await;
        record(&store, "Charcoal", MovementKind::StoreConsumption, "15", days_ago(29)).await;
        // Falls just outside a 30-day window
        record(&store, "Charcoal", MovementKind::StoreConsumption, "300", days_ago(30)).await;

        assert_eq!(resolver.average_daily_usage("Charcoal", 30), dec("1"));
        assert_eq!(resolver.average_daily_usage("Charcoal", 0), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_days_until_stockout() {
        let (store, resolver) = setup().await;
        stock_with_usage(&store, "Charcoal", "80").await;

        assert_eq!(resolver.days_until_stockout("Charcoal"), dec("50"));
    }

    #[tokio::test]
    async fn test_days_until_stockout_sentinel_without_usage() {
        let (store, resolver) = setup().await;
        record(&store, "Charcoal", MovementKind::GoodsReceived, "80", today()).await;

        assert_eq!(resolver.days_until_stockout("Charcoal"), Decimal::from(STOCKOUT_SENTINEL_DAYS));
    }

    #[tokio::test]
    async fn test_idle_stock_is_overstock() {
        let (store, resolver) = setup().await;
        record(&store, "Charcoal", MovementKind::GoodsReceived, "500", today()).await;

        // 500 > 90 * 0
        assert_eq!(resolver.classify("Charcoal"), StockAlertLevel::Overstock);
        assert_eq!(resolver.position("Charcoal").level, StockAlertLevel::Overstock);
    }

    #[tokio::test]
    async fn test_trace_usage_does_not_overflow() {
        let (store, resolver) = setup().await;
        record(&store, "Charcoal", MovementKind::GoodsReceived, "10000000000", days_ago(2)).await;
        record(&store, "Charcoal", MovementKind::StoreConsumption, "0.00000000000000000000000003", today()).await;

        assert_eq!(resolver.days_until_stockout("Charcoal"), Decimal::MAX);
        assert_eq!(resolver.classify("Charcoal"), StockAlertLevel::Overstock);
    }

    #[tokio::test]
    async fn test_classification_levels() {
        let (store, resolver) = setup().await;
        stock_with_usage(&store, "Critical Item", "30").await;
        stock_with_usage(&store, "Warning Item", "35").await;
        stock_with_usage(&store, "Normal Item", "80").await;
        stock_with_usage(&store, "Overstock Item", "130").await;

        assert_eq!(resolver.classify("Critical Item"), StockAlertLevel::Critical);
        assert_eq!(resolver.classify("Warning Item"), StockAlertLevel::Warning);
        assert_eq!(resolver.classify("Normal Item"), StockAlertLevel::Normal);
        assert_eq!(resolver.classify("Overstock Item"), StockAlertLevel::Overstock);
    }

    #[tokio::test]
    async fn test_custom_usage_window() {
        let (store, resolver) = setup().await;
        stock_with_usage(&store, "Charcoal", "80").await;
        let resolver = resolver.with_usage_window(10);

        assert_eq!(resolver.usage_window_days(), 10);
        assert_eq!(resolver.average_daily_usage("Charcoal", 10), dec("3"));
        // 50 kg at 3 kg a day
        assert!(resolver.days_until_stockout("Charcoal") > dec("16"));
        assert!(resolver.days_until_stockout("Charcoal") < dec("17"));
    }

    #[tokio::test]
    async fn test_alerts_sorted_by_level_then_name() {
        let (store, resolver) = setup().await;
        stock_with_usage(&store, "Sawdust", "130").await;
        stock_with_usage(&store, "jigat", "35").await;
        stock_with_usage(&store, "Charcoal", "30").await;
        stock_with_usage(&store, "Bamboo", "34").await;
        stock_with_usage(&store, "Perfume", "80").await;

        let alerts = resolver.alerts(store.item_names());
        let names: Vec<_> = alerts.iter().map(|p| p.item_name.as_str()).collect();

        assert_eq!(names, vec!["Charcoal", "Bamboo", "jigat", "Sawdust"]);
        assert_eq!(alerts[0].level, StockAlertLevel::Critical);
        assert_eq!(alerts[3].level, StockAlertLevel::Overstock);
    }

    #[tokio::test]
    async fn test_position_reports_everything() {
        let (store, resolver) = setup().await;
        stock_with_usage(&store, "Charcoal", "35").await;

        let position = resolver.position(" Charcoal");
        assert_eq!(position.item_name, "Charcoal");
        assert_eq!(position.total_in, dec("35"));
        assert_eq!(position.total_out, dec("30"));
        assert_eq!(position.balance, dec("5"));
        assert_eq!(position.average_daily_usage, dec("1"));
        assert_eq!(position.days_until_stockout, dec("5"));
        assert_eq!(position.level, StockAlertLevel::Warning);
    }

    #[tokio::test]
    async fn test_spare_parts_count_toward_stock() {
        let (store, resolver) = setup().await;
        record(&store, "Cutter Blade", MovementKind::SparePartsPurchase, "10", today()).await;
        record(&store, "Cutter Blade", MovementKind::SparePartsConsumption, "4", today()).await;

        assert_eq!(resolver.balance_of("Cutter Blade", None), dec("6"));
        assert_eq!(store.len(LedgerLog::SparePartsIn), 1);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 3))
    }

    fn kind_strategy() -> impl Strategy<Value = MovementKind> {
        prop_oneof![
            Just(MovementKind::GoodsReceived),
            Just(MovementKind::StoreConsumption),
            Just(MovementKind::ProductionIn),
            Just(MovementKind::ProductionOut),
            Just(MovementKind::Dispatch),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Balance equals the sum of IN minus the sum of OUT
        #[test]
        fn prop_balance_accuracy(
            movements in prop::collection::vec((kind_strategy(), quantity_strategy()), 0..20)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let balance = rt.block_on(async {
                let (store, resolver) = setup().await;
                for (kind, qty) in &movements {
                    store
                        .append(kind.log(), NewMovement::new("Charcoal", *kind, *qty, today()))
                        .await
                        .unwrap();
                }
                resolver.balance_of("Charcoal", None)
            });

            let expected: Decimal = movements
                .iter()
                .map(|(kind, qty)| kind.role().sign() * *qty)
                .sum();
            prop_assert_eq!(balance, expected);
        }

        /// Classification is total and consistent with the balance sign
        #[test]
        fn prop_non_positive_balance_is_critical(
            received in quantity_strategy(),
            used in quantity_strategy()
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (balance, level) = rt.block_on(async {
                let (store, resolver) = setup().await;
                record(&store, "Jigat", MovementKind::GoodsReceived, &received.to_string(), today()).await;
                record(&store, "Jigat", MovementKind::StoreConsumption, &used.to_string(), today()).await;
                (resolver.balance_of("Jigat", None), resolver.classify("Jigat"))
            });

            if balance <= Decimal::ZERO {
                prop_assert_eq!(level, StockAlertLevel::Critical);
            } else {
                prop_assert_ne!(level, StockAlertLevel::Critical);
            }
        }
    }
}
