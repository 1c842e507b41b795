// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use feeclip::engine::credits::CreditLedger;
use feeclip::engine::money::Money;
use feeclip::models::{Credit, CreditStatus, Scope};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn credit(id: i64, investor: &str, balance: Decimal, posted: &str) -> Credit {
    Credit {
        id,
        investor: investor.to_string(),
        fund: None,
        scope: Scope::Fund,
        deal_id: None,
        original_balance: Money::new(balance),
        remaining_balance: Money::new(balance),
        status: CreditStatus::Active,
        date_posted: d(posted),
    }
}

#[test]
fn credits_consume_fifo_by_posting_date() {
    let mut ledger = CreditLedger::new(vec![
        credit(2, "Alice", dec!(500), "2024-02-01"),
        credit(1, "Alice", dec!(300), "2024-01-01"),
    ]);
    let ids = ledger.applicable_ids("Alice", "Growth Fund", Scope::Fund, None);
    assert_eq!(ids, vec![1, 2]);

    let outcome = ledger.apply(Money::new(dec!(600)), &ids).unwrap();
    assert_eq!(outcome.final_amount, Money::ZERO);
    assert_eq!(outcome.applied.len(), 2);
    assert_eq!(outcome.applied[0].credit_id, 1);
    assert_eq!(outcome.applied[0].amount_applied, Money::new(dec!(300)));
    assert_eq!(outcome.applied[1].credit_id, 2);
    assert_eq!(outcome.applied[1].amount_applied, Money::new(dec!(300)));
    assert_eq!(outcome.applied[1].balance_after, Money::new(dec!(200)));

    let credits = ledger.into_credits();
    let first = credits.iter().find(|c| c.id == 1).unwrap();
    assert_eq!(first.status, CreditStatus::Exhausted);
    assert!(first.remaining_balance.is_zero());
    let second = credits.iter().find(|c| c.id == 2).unwrap();
    assert_eq!(second.status, CreditStatus::Active);
    assert_eq!(second.remaining_balance, Money::new(dec!(200)));
}

#[test]
fn same_day_credits_consume_in_id_order() {
    let mut ledger = CreditLedger::new(vec![
        credit(9, "Alice", dec!(100), "2024-01-01"),
        credit(4, "Alice", dec!(100), "2024-01-01"),
    ]);
    let ids = ledger.applicable_ids("Alice", "Growth Fund", Scope::Fund, None);
    assert_eq!(ids, vec![4, 9]);
    let outcome = ledger.apply(Money::new(dec!(150)), &ids).unwrap();
    assert_eq!(outcome.applied[0].credit_id, 4);
    assert_eq!(outcome.applied[1].amount_applied, Money::new(dec!(50)));
}

#[test]
fn payable_never_goes_negative_when_credits_exceed_the_fee() {
    let mut ledger = CreditLedger::new(vec![credit(1, "Alice", dec!(1000), "2024-01-01")]);
    let ids = ledger.applicable_ids("Alice", "Growth Fund", Scope::Fund, None);
    let outcome = ledger.apply(Money::new(dec!(250)), &ids).unwrap();
    assert_eq!(outcome.final_amount, Money::ZERO);
    let credits = ledger.into_credits();
    assert_eq!(credits[0].remaining_balance, Money::new(dec!(750)));
    assert_eq!(credits[0].status, CreditStatus::Active);
}

#[test]
fn remainder_stays_payable_when_credits_run_out() {
    let mut ledger = CreditLedger::new(vec![credit(1, "Alice", dec!(100), "2024-01-01")]);
    let ids = ledger.applicable_ids("Alice", "Growth Fund", Scope::Fund, None);
    let outcome = ledger.apply(Money::new(dec!(400)), &ids).unwrap();
    assert_eq!(outcome.final_amount, Money::new(dec!(300)));
}

#[test]
fn other_investors_credits_are_not_eligible() {
    let ledger = CreditLedger::new(vec![credit(1, "Bob", dec!(500), "2024-01-01")]);
    assert!(ledger
        .applicable_ids("Alice", "Growth Fund", Scope::Fund, None)
        .is_empty());
}

#[test]
fn fund_bound_credit_only_offsets_that_fund() {
    let mut c = credit(1, "Alice", dec!(500), "2024-01-01");
    c.fund = Some("Income Fund".to_string());
    let ledger = CreditLedger::new(vec![c]);
    assert!(ledger
        .applicable_ids("Alice", "Growth Fund", Scope::Fund, None)
        .is_empty());
    assert_eq!(
        ledger.applicable_ids("Alice", "Income Fund", Scope::Fund, None),
        vec![1]
    );
}

#[test]
fn deal_scoped_credit_only_offsets_matching_deal_lines() {
    let mut c = credit(1, "Alice", dec!(500), "2024-01-01");
    c.scope = Scope::Deal;
    c.deal_id = Some("D1".to_string());
    let ledger = CreditLedger::new(vec![c]);

    assert!(ledger
        .applicable_ids("Alice", "Growth Fund", Scope::Fund, None)
        .is_empty());
    assert!(ledger
        .applicable_ids("Alice", "Growth Fund", Scope::Deal, Some("D2"))
        .is_empty());
    assert_eq!(
        ledger.applicable_ids("Alice", "Growth Fund", Scope::Deal, Some("D1")),
        vec![1]
    );
}

#[test]
fn fund_scoped_credit_offsets_deal_lines_too() {
    let ledger = CreditLedger::new(vec![credit(1, "Alice", dec!(500), "2024-01-01")]);
    assert_eq!(
        ledger.applicable_ids("Alice", "Growth Fund", Scope::Deal, Some("D1")),
        vec![1]
    );
}

#[test]
fn exhausted_credit_is_skipped_on_later_lines() {
    let mut ledger = CreditLedger::new(vec![credit(1, "Alice", dec!(100), "2024-01-01")]);
    let ids = ledger.applicable_ids("Alice", "Growth Fund", Scope::Fund, None);
    ledger.apply(Money::new(dec!(100)), &ids).unwrap();
    assert!(ledger
        .applicable_ids("Alice", "Growth Fund", Scope::Fund, None)
        .is_empty());
}
