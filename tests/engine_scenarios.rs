//! End-to-end engine behaviour: balances, replays, reversals and batches

mod common;

use common::*;
use futures::future::join_all;
use groove_wallet::models::{Account, AccountStatus, OperationKind, TransactionStatus};
use groove_wallet::protocol::request::GetAccountRequest;
use groove_wallet::protocol::DUPLICATE_STATUS;
use groove_wallet::store::TransactionStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_wager_replay_result_then_rollback_refused() {
    let h = Harness::with_balance(dec!(100.00));

    let first = h.engine.wager(&wager("tx1", dec!(30.00))).await;
    assert_eq!(first.code, 200);
    assert_eq!(first.status, "Success");
    assert_eq!(h.balance(), dec!(70.00));

    let replay = h.engine.wager(&wager("tx1", dec!(30.00))).await;
    assert_eq!(replay.code, 200);
    assert_eq!(replay.status, DUPLICATE_STATUS);
    assert_eq!(replay.accounttransactionid, first.accounttransactionid);
    assert_eq!(h.balance(), dec!(70.00));

    let settled = h.engine.result(&result("tx1", dec!(50.00))).await;
    assert_eq!(settled.code, 200);
    assert_eq!(h.balance(), dec!(120.00));
    assert_eq!(settled.balances.balance.to_string(), "120.00");

    let refused = h.engine.rollback(&rollback("tx1", None)).await;
    assert_eq!(refused.code, 110);
    assert_eq!(h.balance(), dec!(120.00));
}

#[tokio::test]
async fn test_wager_beyond_balance_is_out_of_money() {
    let h = Harness::with_balance(dec!(20.00));

    let response = h.engine.wager(&wager("tx1", dec!(20.01))).await;
    assert_eq!(response.code, 1006);
    assert_eq!(response.status, "Out of money");
    assert_eq!(response.balances.balance, dec!(20.00));
    assert_eq!(h.balance(), dec!(20.00));
    assert!(h.store.get("tx1").unwrap().is_none());

    // The refused id stays free for a retry that fits
    let retry = h.engine.wager(&wager("tx1", dec!(20.00))).await;
    assert_eq!(retry.code, 200);
    assert_eq!(h.balance(), dec!(0.00));
}

#[tokio::test]
async fn test_expired_session_blocks_wagers_but_not_results_or_rollbacks() {
    let h = Harness::with_balance(dec!(100.00));
    assert_eq!(h.engine.wager(&wager("tx1", dec!(10.00))).await.code, 200);
    assert_eq!(h.engine.wager(&wager("tx2", dec!(10.00))).await.code, 200);

    h.sessions.expire(SESSION);

    let blocked = h.engine.wager(&wager("tx3", dec!(10.00))).await;
    assert_eq!(blocked.code, 1000);
    assert_eq!(blocked.status, "Not logged on");

    let settled = h.engine.result(&result("tx1", dec!(25.00))).await;
    assert_eq!(settled.code, 200);

    let returned = h.engine.rollback(&rollback("tx2", None)).await;
    assert_eq!(returned.code, 200);

    assert_eq!(h.balance(), dec!(115.00));
}

#[tokio::test]
async fn test_replayed_wager_answers_even_after_session_expiry() {
    let h = Harness::with_balance(dec!(100.00));
    let first = h.engine.wager(&wager("tx1", dec!(10.00))).await;
    h.sessions.expire(SESSION);

    let replay = h.engine.wager(&wager("tx1", dec!(10.00))).await;
    assert_eq!(replay.code, 200);
    assert_eq!(replay.status, DUPLICATE_STATUS);
    assert_eq!(replay.accounttransactionid, first.accounttransactionid);
}

#[tokio::test]
async fn test_rollback_then_rollback_rollback_restores_each_step() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(30.00))).await;
    assert_eq!(h.balance(), dec!(70.00));

    let rolled = h.engine.rollback(&rollback("tx1", None)).await;
    assert_eq!(rolled.code, 200);
    assert_eq!(h.balance(), dec!(100.00));
    let wager_record = h.store.get("tx1").unwrap().unwrap();
    assert_eq!(wager_record.status, TransactionStatus::RolledBack);

    let again = h.engine.rollback(&rollback("tx1", None)).await;
    assert_eq!(again.status, DUPLICATE_STATUS);
    assert_eq!(h.balance(), dec!(100.00));

    let undone = h.engine.rollback_rollback(&rollback_rollback("tx1")).await;
    assert_eq!(undone.code, 200);
    assert_eq!(h.balance(), dec!(70.00));
    let rollback_record = h.store.get("tx1_rollback").unwrap().unwrap();
    assert_eq!(rollback_record.status, TransactionStatus::RolledBack);

    let undone_again = h.engine.rollback_rollback(&rollback_rollback("tx1")).await;
    assert_eq!(undone_again.status, DUPLICATE_STATUS);
    assert_eq!(h.balance(), dec!(70.00));
}

#[tokio::test]
async fn test_rollback_of_unknown_wager_is_not_found() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(5.00))).await;

    let response = h.engine.rollback(&rollback("missing", None)).await;
    assert_eq!(response.code, 102);
    assert_eq!(response.status, "Wager not found");

    let response = h.engine.rollback_rollback(&rollback_rollback("tx1")).await;
    assert_eq!(response.code, 102);
    assert_eq!(h.balance(), dec!(95.00));
}

#[tokio::test]
async fn test_partial_rollback_bounded_by_bet() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(30.00))).await;

    let too_much = h.engine.rollback(&rollback("tx1", Some(dec!(30.01)))).await;
    assert_eq!(too_much.code, 110);
    assert_eq!(h.balance(), dec!(70.00));

    let partial = h.engine.rollback(&rollback("tx1", Some(dec!(12.50)))).await;
    assert_eq!(partial.code, 200);
    assert_eq!(h.balance(), dec!(82.50));

    let undone = h.engine.rollback_rollback(&rollback_rollback("tx1")).await;
    assert_eq!(undone.code, 200);
    assert_eq!(h.balance(), dec!(70.00));
}

#[tokio::test]
async fn test_reverse_win_takes_back_the_credit() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(10.00))).await;
    h.engine.result(&result("tx1", dec!(40.00))).await;
    assert_eq!(h.balance(), dec!(130.00));

    let too_much = h.engine.reverse_win(&reverse_win("tx1", dec!(40.01))).await;
    assert_eq!(too_much.code, 110);

    let reversed = h.engine.reverse_win(&reverse_win("tx1", dec!(40.00))).await;
    assert_eq!(reversed.code, 200);
    assert_eq!(h.balance(), dec!(90.00));
    let result_record = h.store.get("tx1_result").unwrap().unwrap();
    assert_eq!(result_record.status, TransactionStatus::RolledBack);

    let replay = h.engine.reverse_win(&reverse_win("tx1", dec!(40.00))).await;
    assert_eq!(replay.status, DUPLICATE_STATUS);
    assert_eq!(h.balance(), dec!(90.00));

    let unknown = h.engine.reverse_win(&reverse_win("tx9", dec!(1.00))).await;
    assert_eq!(unknown.code, 102);
}

#[tokio::test]
async fn test_reverse_win_never_drives_balance_negative() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(100.00))).await;
    h.engine.result(&result("tx1", dec!(50.00))).await;
    h.engine.wager(&wager("tx2", dec!(50.00))).await;
    assert_eq!(h.balance(), dec!(0.00));

    let response = h.engine.reverse_win(&reverse_win("tx1", dec!(50.00))).await;
    assert_eq!(response.code, 1006);
    assert_eq!(h.balance(), dec!(0.00));
    assert!(h.store.get("tx1_rollback_result").unwrap().is_none());
}

#[tokio::test]
async fn test_wager_and_result_applies_net_delta() {
    let h = Harness::with_balance(dec!(100.00));

    let response = h.engine.wager_and_result(&wager_and_result("tx1", dec!(20.00), dec!(35.00))).await;
    assert_eq!(response.code, 200);
    assert_eq!(response.realmoneybet, dec!(20.00));
    assert_eq!(response.real_money_win, dec!(35.00));
    assert_eq!(h.balance(), dec!(115.00));

    let replay = h.engine.wager_and_result(&wager_and_result("tx1", dec!(20.00), dec!(35.00))).await;
    assert_eq!(replay.status, DUPLICATE_STATUS);
    assert_eq!(replay.real_money_win, dec!(35.00));
    assert_eq!(h.balance(), dec!(115.00));

    // The bet must be covered even when the win would make up for it
    let uncovered = h.engine.wager_and_result(&wager_and_result("tx2", dec!(200.00), dec!(500.00))).await;
    assert_eq!(uncovered.code, 1006);
    assert_eq!(h.balance(), dec!(115.00));

    let not_eligible = h.engine.rollback(&rollback("tx1", None)).await;
    assert_eq!(not_eligible.code, 110);
}

#[tokio::test]
async fn test_wager_and_result_losing_and_break_even_rounds() {
    let h = Harness::with_balance(dec!(120.00));

    let lost = h.engine.wager_and_result(&wager_and_result("tx2", dec!(20.00), dec!(0.00))).await;
    assert_eq!(lost.code, 200);
    assert_eq!(lost.real_money_win.to_string(), "0.00");
    assert_eq!(h.balance(), dec!(100.00));

    let even = h.engine.wager_and_result(&wager_and_result("tx3", dec!(15.00), dec!(15.00))).await;
    assert_eq!(even.code, 200);
    assert_eq!(h.balance(), dec!(100.00));
    let record = h.store.get("tx3").unwrap().unwrap();
    assert_eq!(record.delta, dec!(0));
}

#[tokio::test]
async fn test_zero_result_is_recorded_and_replays_as_duplicate() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(30.00))).await;

    let settled = h.engine.result(&result("tx1", dec!(0.00))).await;
    assert_eq!(settled.code, 200);
    assert_eq!(settled.status, "Success");
    assert_eq!(h.balance(), dec!(70.00));
    let record = h.store.get("tx1_result").unwrap().unwrap();
    assert_eq!(record.kind, OperationKind::Result);
    assert_eq!(record.amount, dec!(0));

    let replay = h.engine.result(&result("tx1", dec!(50.00))).await;
    assert_eq!(replay.code, 200);
    assert_eq!(replay.status, DUPLICATE_STATUS);
    assert_eq!(replay.wallet_tx, settled.wallet_tx);
    assert_eq!(h.balance(), dec!(70.00));
}

#[tokio::test]
async fn test_result_only_settles_open_stakes() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager_and_result(&wager_and_result("tx1", dec!(10.00), dec!(20.00))).await;
    h.engine.jackpot(&jackpot("jp-1", dec!(5.00))).await;
    assert_eq!(h.balance(), dec!(115.00));

    assert_eq!(h.engine.result(&result("tx1", dec!(20.00))).await.code, 110);
    assert_eq!(h.engine.result(&result("jp-1", dec!(5.00))).await.code, 110);
    assert_eq!(h.balance(), dec!(115.00));
    assert!(h.store.get("tx1_result").unwrap().is_none());
}

#[tokio::test]
async fn test_jackpot_credits_once() {
    let h = Harness::with_balance(dec!(10.00));
    h.accounts.insert(Account::new(PLAYER, PLAYER, "USD")).unwrap();

    let paid = h.engine.jackpot(&jackpot("jp-1", dec!(500.00))).await;
    assert_eq!(paid.code, 200);
    assert_eq!(paid.real_money_win, dec!(500.00));
    assert_eq!(h.balance(), dec!(510.00));

    let replay = h.engine.jackpot(&jackpot("jp-1", dec!(500.00))).await;
    assert_eq!(replay.status, DUPLICATE_STATUS);
    assert_eq!(h.balance(), dec!(510.00));
}

#[tokio::test]
async fn test_transaction_id_reused_across_kinds_is_refused() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(10.00))).await;

    let response = h.engine.jackpot(&jackpot("tx1", dec!(5.00))).await;
    assert_eq!(response.code, 409);
    assert_eq!(response.status, "Transaction ID exists");
    assert_eq!(h.balance(), dec!(90.00));
}

#[tokio::test]
async fn test_session_of_another_player_is_refused() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(10.00))).await;
    h.sessions
        .open("sess-2", "player-2", chrono::Utc::now() + chrono::Duration::hours(1));

    let mut request = wager("tx2", dec!(10.00));
    request.context = context_for(PLAYER, "sess-2");
    let response = h.engine.wager(&request).await;
    assert_eq!(response.code, 110);
    assert_eq!(h.balance(), dec!(90.00));
}

#[tokio::test]
async fn test_amount_finer_than_currency_is_refused() {
    let h = Harness::with_balance(dec!(100.00));

    let response = h.engine.wager(&wager("tx1", dec!(1.005))).await;
    assert_eq!(response.code, 110);
    assert_eq!(h.balance(), dec!(100.00));

    // Trailing zeros carry no extra precision
    let response = h.engine.wager(&wager("tx2", dec!(1.500))).await;
    assert_eq!(response.code, 200);
    assert_eq!(response.realmoneybet.to_string(), "1.50");
}

#[tokio::test]
async fn test_suspended_account_cannot_wager_but_is_still_paid() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(10.00))).await;

    let mut account = Account::new(PLAYER, PLAYER, "USD");
    account.status = AccountStatus::Suspended;
    h.accounts.insert(account).unwrap();

    assert_eq!(h.engine.wager(&wager("tx2", dec!(10.00))).await.code, 110);
    assert_eq!(h.engine.result(&result("tx1", dec!(30.00))).await.code, 200);
    assert_eq!(h.balance(), dec!(120.00));
}

#[tokio::test]
async fn test_result_for_rolled_back_wager_is_refused() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager(&wager("tx1", dec!(10.00))).await;
    h.engine.rollback(&rollback("tx1", None)).await;

    let response = h.engine.result(&result("tx1", dec!(50.00))).await;
    assert_eq!(response.code, 110);
    assert_eq!(h.balance(), dec!(100.00));
}

#[tokio::test]
async fn test_unknown_account_on_credit_is_refused() {
    let h = Harness::with_balance(dec!(100.00));

    let response = h.engine.result(&result("tx1", dec!(10.00))).await;
    assert_eq!(response.code, 110);
    assert_eq!(h.balance(), dec!(100.00));
}

#[tokio::test]
async fn test_batch_charges_only_new_bets() {
    let h = Harness::with_balance(dec!(100.00));

    let first = h.engine.wager_by_batch(&batch(&[("b1", dec!(10.00)), ("b2", dec!(20.00))])).await;
    assert_eq!(first.code, 200);
    assert_eq!(first.bets.len(), 2);
    assert_eq!(h.balance(), dec!(70.00));

    let second = h.engine.wager_by_batch(&batch(&[("b2", dec!(20.00)), ("b3", dec!(5.00))])).await;
    assert_eq!(second.code, 200);
    assert_eq!(second.status, "Success");
    assert_eq!(second.bets[0].transaction_id, first.bets[1].transaction_id);
    assert_eq!(h.balance(), dec!(65.00));

    let replay = h.engine.wager_by_batch(&batch(&[("b1", dec!(10.00)), ("b3", dec!(5.00))])).await;
    assert_eq!(replay.status, DUPLICATE_STATUS);
    assert_eq!(replay.bets.len(), 2);
    assert_eq!(h.balance(), dec!(65.00));

    let record = h.store.get("b3").unwrap().unwrap();
    assert_eq!(record.kind, OperationKind::BatchItem);
}

#[tokio::test]
async fn test_batch_repeating_an_id_charges_it_once() {
    let h = Harness::with_balance(dec!(100.00));

    let response = h
        .engine
        .wager_by_batch(&batch(&[("b1", dec!(10.00)), ("b1", dec!(10.00)), ("b2", dec!(1.00))]))
        .await;
    assert_eq!(response.code, 200);
    assert_eq!(response.bets.len(), 3);
    assert_eq!(response.bets[0], response.bets[1]);
    assert_eq!(h.balance(), dec!(89.00));
}

#[tokio::test]
async fn test_batch_over_balance_writes_nothing() {
    let h = Harness::with_balance(dec!(25.00));

    let response = h.engine.wager_by_batch(&batch(&[("b1", dec!(10.00)), ("b2", dec!(20.00))])).await;
    assert_eq!(response.code, 1006);
    assert!(response.bets.is_empty());
    assert_eq!(h.balance(), dec!(25.00));
    assert!(h.store.get("b1").unwrap().is_none());
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn test_batch_items_can_be_rolled_back() {
    let h = Harness::with_balance(dec!(100.00));
    h.engine.wager_by_batch(&batch(&[("b1", dec!(10.00)), ("b2", dec!(20.00))])).await;

    let response = h.engine.rollback(&rollback("b2", None)).await;
    assert_eq!(response.code, 200);
    assert_eq!(h.balance(), dec!(90.00));
}

#[tokio::test]
async fn test_account_and_balance_lookups() {
    let h = Harness::with_balance(dec!(42.5));

    let balance = h.engine.get_balance(&get_balance()).await;
    assert_eq!(balance.code, 200);
    assert_eq!(balance.balances.balance.to_string(), "42.50");
    assert_eq!(balance.balances.bonus_balance.to_string(), "0.00");

    let account = h
        .engine
        .get_account(&GetAccountRequest { context: context() })
        .await;
    assert_eq!(account.code, 200);
    assert_eq!(account.accountid, PLAYER);
    assert_eq!(account.currency, "USD");
    assert_eq!(account.gamesessionid, SESSION);

    let foreign = h
        .engine
        .get_account(&GetAccountRequest {
            context: context_for("player-9", SESSION),
        })
        .await;
    assert_eq!(foreign.code, 110);

    h.sessions.deactivate(SESSION);
    let logged_out = h.engine.get_balance(&get_balance()).await;
    assert_eq!(logged_out.code, 1000);
}

#[tokio::test]
async fn test_concurrent_duplicates_debit_once() {
    let h = Arc::new(Harness::with_balance(dec!(100.00)));

    let handles = (0..32).map(|_| {
        let h = h.clone();
        tokio::spawn(async move { h.engine.wager(&wager("tx-shared", dec!(30.00))).await })
    });

    let mut fresh = 0;
    let mut wallet_ids = std::collections::HashSet::new();
    for joined in join_all(handles).await {
        let response = joined.unwrap();
        assert_eq!(response.code, 200);
        if response.status == "Success" {
            fresh += 1;
        }
        wallet_ids.insert(response.accounttransactionid);
    }

    assert_eq!(fresh, 1);
    assert_eq!(wallet_ids.len(), 1);
    assert_eq!(h.balance(), dec!(70.00));
}

#[tokio::test]
async fn test_concurrent_wagers_never_overdraw() {
    let h = Arc::new(Harness::with_balance(dec!(100.00)));

    let handles = (0..25).map(|i| {
        let h = h.clone();
        tokio::spawn(async move { h.engine.wager(&wager(&format!("tx-{}", i), dec!(10.00))).await.code })
    });

    let mut accepted = 0;
    let mut refused = 0;
    for joined in join_all(handles).await {
        match joined.unwrap() {
            200 => accepted += 1,
            1006 => refused += 1,
            other => panic!("unexpected code {}", other),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(refused, 15);
    assert_eq!(h.balance(), dec!(0.00));
}

#[tokio::test]
async fn test_concurrent_wager_and_rollback_stay_consistent() {
    let h = Arc::new(Harness::with_balance(dec!(50.00)));
    h.engine.wager(&wager("tx1", dec!(20.00))).await;

    let rollback_task = {
        let h = h.clone();
        tokio::spawn(async move { h.engine.rollback(&rollback("tx1", None)).await.code })
    };
    let wager_task = {
        let h = h.clone();
        tokio::spawn(async move { h.engine.wager(&wager("tx2", dec!(40.00))).await.code })
    };

    let rollback_code = rollback_task.await.unwrap();
    let wager_code = wager_task.await.unwrap();
    assert_eq!(rollback_code, 200);

    // Either order is valid; the balance must match the codes
    let expected = if wager_code == 200 { dec!(10.00) } else { dec!(50.00) };
    assert_eq!(h.balance(), expected);
}
