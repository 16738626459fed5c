//! Property tests for the ledger invariants.

use chrono::NaiveDate;
use proptest::prelude::*;
use stonks::domain::ledger::{BuyOutcome, Ledger, LedgerConfig, SellOutcome};

const SYMBOLS: [&str; 3] = ["AAA", "BBB", "CCC"];

#[derive(Debug, Clone)]
enum Op {
    Buy(usize, f64),
    Sell(usize, f64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SYMBOLS.len(), 0.5f64..5_000.0).prop_map(|(s, p)| Op::Buy(s, p)),
        (0..SYMBOLS.len(), 0.5f64..5_000.0).prop_map(|(s, p)| Op::Sell(s, p)),
    ]
}

fn ledger_config() -> impl Strategy<Value = LedgerConfig> {
    (
        100.0f64..50_000.0,
        0.0f64..2_000.0,
        1.0f64..10_000.0,
        0.0f64..50.0,
        0.0f64..0.9,
    )
        .prop_map(|(cash, min_buy, extra, fee, tax)| LedgerConfig {
            initial_cash: cash,
            min_buy,
            max_buy: min_buy + extra,
            transaction_fee: fee,
            tax_rate: tax,
        })
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
}

proptest! {
    #[test]
    fn cash_never_negative(config in ledger_config(), ops in prop::collection::vec(op(), 1..60)) {
        let mut ledger = Ledger::new(config, &SYMBOLS);
        for op in ops {
            match op {
                Op::Buy(s, p) => { ledger.buy(SYMBOLS[s], day(), p); }
                Op::Sell(s, p) => { ledger.sell(SYMBOLS[s], day(), p); }
            }
            prop_assert!(ledger.cash() >= 0.0, "cash went negative: {}", ledger.cash());
        }
    }

    #[test]
    fn flat_positions_have_zero_cost(config in ledger_config(), ops in prop::collection::vec(op(), 1..60)) {
        let mut ledger = Ledger::new(config, &SYMBOLS);
        for op in ops {
            match op {
                Op::Buy(s, p) => { ledger.buy(SYMBOLS[s], day(), p); }
                Op::Sell(s, p) => { ledger.sell(SYMBOLS[s], day(), p); }
            }
            for (_, position) in ledger.positions() {
                if position.amount_held == 0 {
                    prop_assert_eq!(position.average_cost, 0.0);
                }
            }
        }
    }

    #[test]
    fn weighted_average_cost(p1 in 1.0f64..500.0, p2 in 1.0f64..500.0) {
        let config = LedgerConfig {
            initial_cash: 1_000_000.0,
            min_buy: 0.0,
            max_buy: 5_000.0,
            transaction_fee: 7.0,
            tax_rate: 0.25,
        };
        let mut ledger = Ledger::new(config, &["AAA"]);

        let a1 = match ledger.buy("AAA", day(), p1) {
            BuyOutcome::Bought { shares, .. } => shares,
            other => return Err(TestCaseError::fail(format!("first buy refused: {other:?}"))),
        };
        let a2 = match ledger.buy("AAA", day(), p2) {
            BuyOutcome::Bought { shares, .. } => shares,
            other => return Err(TestCaseError::fail(format!("second buy refused: {other:?}"))),
        };

        let expected = (a1 as f64 * p1 + a2 as f64 * p2) / (a1 + a2) as f64;
        let position = ledger.position("AAA").unwrap();
        prop_assert_eq!(position.amount_held, a1 + a2);
        prop_assert!((position.average_cost - expected).abs() < 1e-9 * expected.max(1.0));
    }

    #[test]
    fn sell_never_reduces_realized_profit(
        config in ledger_config(),
        buy_price in 1.0f64..1_000.0,
        sell_price in 0.5f64..2_000.0,
    ) {
        let mut ledger = Ledger::new(config, &["AAA"]);
        ledger.buy("AAA", day(), buy_price);
        let before = ledger.position("AAA").unwrap().realized_profit;

        match ledger.sell("AAA", day(), sell_price) {
            SellOutcome::Sold { profit, .. } => prop_assert!(profit > 0.0),
            SellOutcome::Refused(_) => {}
        }

        let after = ledger.position("AAA").unwrap().realized_profit;
        prop_assert!(after >= before);
    }
}
