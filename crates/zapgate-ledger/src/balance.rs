// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user sat balances with atomic debit.

use tracing::info;

use zapgate_core::GatewayError;
use zapgate_store::kv::{self, map_tr_err, SqliteKv};

use crate::receipt::ZapReceipt;

/// Persistent per-user balance ledger.
///
/// A debit never produces a negative balance; a failing debit leaves the
/// balance unchanged.
#[derive(Clone)]
pub struct Ledger {
    kv: SqliteKv,
}

impl Ledger {
    pub fn new(kv: SqliteKv) -> Self {
        Self { kv }
    }

    /// Current balance in sats (0 for unknown users).
    pub async fn balance(&self, user: &str) -> Result<u64, GatewayError> {
        let key = balance_key(user);
        self.kv
            .connection()
            .call(move |conn| Ok(read_balance(conn, &key)?))
            .await
            .map_err(map_tr_err)
    }

    /// Adds `amount` sats and returns the new balance.
    pub async fn credit(&self, user: &str, amount: u64) -> Result<u64, GatewayError> {
        let key = balance_key(user);
        let new_balance = self
            .kv
            .connection()
            .call(move |conn| {
                let current = read_balance(conn, &key)?;
                let updated = current.saturating_add(amount);
                kv::put_sync(conn, &key, &updated.to_string())?;
                Ok(updated)
            })
            .await
            .map_err(map_tr_err)?;

        info!(user, amount, new_balance, "balance credited");
        Ok(new_balance)
    }

    /// Subtracts `amount` sats atomically, returning the new balance, or
    /// [`GatewayError::InsufficientFunds`] without changing anything.
    pub async fn debit(&self, user: &str, amount: u64) -> Result<u64, GatewayError> {
        let key = balance_key(user);
        let outcome = self
            .kv
            .connection()
            .call(move |conn| {
                let current = read_balance(conn, &key)?;
                if current < amount {
                    return Ok(Err(current));
                }
                let updated = current - amount;
                kv::put_sync(conn, &key, &updated.to_string())?;
                Ok(Ok(updated))
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            Ok(new_balance) => {
                info!(user, amount, new_balance, "balance debited");
                Ok(new_balance)
            }
            Err(balance) => Err(GatewayError::InsufficientFunds {
                required: amount,
                balance,
            }),
        }
    }

    /// Applies a parsed receipt at most once, keyed by its event id.
    ///
    /// Returns `Some(new_balance)` when credited, `None` when the receipt
    /// was already applied.
    pub async fn apply_receipt(
        &self,
        receipt: &ZapReceipt,
    ) -> Result<Option<u64>, GatewayError> {
        let receipt = receipt.clone();
        let balance_key = balance_key(&receipt.payer_pubkey);
        let receipt_key = receipt_key(&receipt.receipt_event_id);

        let receipt_for_call = receipt.clone();
        let applied = self
            .kv
            .connection()
            .call(move |conn| {
                let receipt = receipt_for_call;
                if kv::get_sync(conn, &receipt_key)?.is_some() {
                    return Ok(None);
                }
                let encoded = serde_json::to_string(&receipt)
                    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                kv::put_sync(conn, &receipt_key, &encoded)?;

                let current = read_balance(conn, &balance_key)?;
                let updated = current.saturating_add(receipt.amount_sats);
                kv::put_sync(conn, &balance_key, &updated.to_string())?;
                Ok(Some(updated))
            })
            .await
            .map_err(map_tr_err)?;

        if let Some(new_balance) = applied {
            info!(
                payer = %receipt.payer_pubkey,
                amount_sats = receipt.amount_sats,
                receipt_event_id = %receipt.receipt_event_id,
                new_balance,
                "zap receipt applied"
            );
        }
        Ok(applied)
    }
}

fn read_balance(
    conn: &rusqlite::Connection,
    key: &str,
) -> Result<u64, tokio_rusqlite::Error> {
    match kv::get_sync(conn, key)? {
        Some(value) => Ok(value.parse::<u64>().unwrap_or(0)),
        None => Ok(0),
    }
}

fn balance_key(user: &str) -> String {
    format!("balance:{user}")
}

fn receipt_key(event_id: &str) -> String {
    format!("receipt:{event_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger() -> Ledger {
        Ledger::new(SqliteKv::open_in_memory().await.unwrap())
    }

    fn receipt(id: &str, payer: &str, sats: u64) -> ZapReceipt {
        ZapReceipt {
            payer_pubkey: payer.into(),
            amount_sats: sats,
            receipt_event_id: id.into(),
            request_event_id: None,
            bolt11: "lnbc1...".into(),
            description_raw: String::new(),
        }
    }

    #[tokio::test]
    async fn unknown_user_has_zero_balance() {
        let ledger = ledger().await;
        assert_eq!(ledger.balance("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn credit_then_debit() {
        let ledger = ledger().await;
        assert_eq!(ledger.credit("u1", 100).await.unwrap(), 100);
        assert_eq!(ledger.debit("u1", 20).await.unwrap(), 80);
        assert_eq!(ledger.balance("u1").await.unwrap(), 80);
    }

    #[tokio::test]
    async fn overdraft_fails_and_leaves_balance_unchanged() {
        let ledger = ledger().await;
        ledger.credit("u1", 10).await.unwrap();

        let err = ledger.debit("u1", 20).await.unwrap_err();
        match err {
            GatewayError::InsufficientFunds { required, balance } => {
                assert_eq!(required, 20);
                assert_eq!(balance, 10);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        assert_eq!(ledger.balance("u1").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn concurrent_debits_never_overdraw() {
        let ledger = ledger().await;
        ledger.credit("u1", 100).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.debit("u1", 10).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        // Exactly 10 debits of 10 sats fit in 100.
        assert_eq!(successes, 10);
        assert_eq!(ledger.balance("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mixed_credits_and_debits_sum_correctly() {
        let ledger = ledger().await;
        ledger.credit("u1", 50).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10u64 {
            let ledger = ledger.clone();
            if i % 2 == 0 {
                handles.push(tokio::spawn(async move {
                    ledger.credit("u1", 5).await.map(|_| ())
                }));
            } else {
                handles.push(tokio::spawn(async move {
                    ledger.debit("u1", 5).await.map(|_| ())
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // 50 + 5*5 credited - 5*5 debited = 50.
        assert_eq!(ledger.balance("u1").await.unwrap(), 50);
    }

    #[tokio::test]
    async fn receipt_applies_once() {
        let ledger = ledger().await;

        let first = ledger.apply_receipt(&receipt("r1", "u1", 2)).await.unwrap();
        assert_eq!(first, Some(2));

        let replay = ledger.apply_receipt(&receipt("r1", "u1", 2)).await.unwrap();
        assert_eq!(replay, None);

        assert_eq!(ledger.balance("u1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn distinct_receipts_accumulate() {
        let ledger = ledger().await;
        ledger.apply_receipt(&receipt("r1", "u1", 5)).await.unwrap();
        ledger.apply_receipt(&receipt("r2", "u1", 7)).await.unwrap();
        assert_eq!(ledger.balance("u1").await.unwrap(), 12);
    }
}
