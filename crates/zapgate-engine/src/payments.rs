// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zap receipt and balance-query handling.
//!
//! Both bypass the work queue and the rate limiter: receipts credit the
//! ledger idempotently, balance requests answer synchronously with a
//! signed snapshot. Acknowledgement publishing is best-effort.

use std::sync::Arc;

use tracing::{debug, info, warn};

use zapgate_ledger::{Ledger, ZapReceipt};
use zapgate_proto::Event;

use crate::outbound::Responder;
use crate::stats::EngineStats;

/// Ledger-facing handler for payment and balance events.
pub struct PaymentGate {
    ledger: Arc<Ledger>,
    responder: Arc<Responder>,
    stats: Arc<EngineStats>,
    bot_name: String,
}

impl PaymentGate {
    pub fn new(
        ledger: Arc<Ledger>,
        responder: Arc<Responder>,
        stats: Arc<EngineStats>,
        bot_name: String,
    ) -> Self {
        Self {
            ledger,
            responder,
            stats,
            bot_name,
        }
    }

    /// Parses and applies a zap receipt, then acknowledges the payer.
    pub async fn handle_receipt(&self, event: &Event) {
        let receipt = match ZapReceipt::parse(event) {
            Ok(receipt) => receipt,
            Err(e) => {
                debug!(event_id = %event.id, error = %e, "dropping unparsable receipt");
                return;
            }
        };

        match self.ledger.apply_receipt(&receipt).await {
            Ok(Some(new_balance)) => {
                self.stats.record_receipt_applied();
                info!(
                    payer = %receipt.payer_pubkey,
                    amount_sats = receipt.amount_sats,
                    new_balance,
                    "payment received"
                );

                let note = format!(
                    "Thanks for the {} sats! Your {} balance is now {} sats. ⚡",
                    receipt.amount_sats, self.bot_name, new_balance
                );
                if let Err(e) = self
                    .responder
                    .public_note(&note, &receipt.payer_pubkey)
                    .await
                {
                    debug!(error = %e, "zap acknowledgement note not published");
                }
                if let Err(e) = self
                    .responder
                    .balance_snapshot(&receipt.payer_pubkey, new_balance)
                    .await
                {
                    debug!(error = %e, "balance snapshot not published");
                }
            }
            Ok(None) => {
                debug!(receipt_event_id = %receipt.receipt_event_id, "receipt already applied");
            }
            Err(e) => {
                warn!(error = %e, "failed to apply receipt");
            }
        }
    }

    /// Answers a balance request with a signed snapshot.
    pub async fn handle_balance_request(&self, event: &Event) {
        self.stats.record_balance_query();
        let balance = match self.ledger.balance(&event.pubkey).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, user = %event.pubkey, "balance lookup failed");
                return;
            }
        };
        if let Err(e) = self.responder.balance_snapshot(&event.pubkey, balance).await {
            debug!(error = %e, "balance response not published");
        }
    }
}
