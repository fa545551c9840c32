//! # Wallet Ledger Service
//!
//! Each operation pre-validates its invariants, applies deltas in one
//! atomic unit under the wallet locks, then journals the movement bound to
//! the triggering chain hash. Two-wallet operations lock in sorted
//! `(tenant, agent)` order.

use crate::domain::entities::{currency_is_valid, Wallet, WalletSnapshot};
use crate::domain::errors::WalletError;
use crate::domain::journal::{check_conservation, JournalEntry, JournalLeg};
use dashmap::DashMap;
use parking_lot::Mutex;
use sk_types::Cents;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

type WalletKey = (String, String);

/// Balance ledger for every wallet of every tenant.
#[derive(Default)]
pub struct WalletLedger {
    wallets: DashMap<WalletKey, Arc<Mutex<Wallet>>>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl WalletLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wallet for an agent.
    pub fn create_wallet(
        &self,
        tenant_id: &str,
        agent_id: &str,
        currency: &str,
    ) -> Result<WalletSnapshot, WalletError> {
        if !currency_is_valid(currency) {
            return Err(WalletError::InvalidCurrency {
                currency: currency.to_string(),
            });
        }
        let key = (tenant_id.to_string(), agent_id.to_string());
        if self.wallets.contains_key(&key) {
            return Err(WalletError::WalletExists {
                agent_id: agent_id.to_string(),
            });
        }
        let wallet = Wallet {
            tenant_id: tenant_id.to_string(),
            agent_id: agent_id.to_string(),
            currency: currency.to_string(),
            available_cents: 0,
            escrow_locked_cents: 0,
        };
        self.wallets.insert(key, Arc::new(Mutex::new(wallet.clone())));
        Ok(wallet)
    }

    /// Snapshot a wallet.
    pub fn get(&self, tenant_id: &str, agent_id: &str) -> Result<WalletSnapshot, WalletError> {
        let handle = self.handle(tenant_id, agent_id)?;
        let wallet = handle.lock();
        Ok(wallet.clone())
    }

    /// Credit external funds into `available`.
    pub fn credit(
        &self,
        tenant_id: &str,
        agent_id: &str,
        cents: Cents,
        chain_hash: &str,
        ts: u64,
    ) -> Result<WalletSnapshot, WalletError> {
        let handle = self.handle(tenant_id, agent_id)?;
        let mut wallet = handle.lock();
        wallet.available_cents += cents;
        let snapshot = wallet.clone();
        drop(wallet);
        self.record(
            tenant_id,
            "credit",
            vec![leg(agent_id, cents as i64, 0)],
            chain_hash,
            ts,
        )?;
        Ok(snapshot)
    }

    /// Debit external funds out of `available`.
    pub fn debit(
        &self,
        tenant_id: &str,
        agent_id: &str,
        cents: Cents,
        chain_hash: &str,
        ts: u64,
    ) -> Result<WalletSnapshot, WalletError> {
        let handle = self.handle(tenant_id, agent_id)?;
        let mut wallet = handle.lock();
        if wallet.available_cents < cents {
            return Err(WalletError::InsufficientFunds {
                needed_cents: cents,
                available_cents: wallet.available_cents,
            });
        }
        wallet.available_cents -= cents;
        let snapshot = wallet.clone();
        drop(wallet);
        self.record(
            tenant_id,
            "debit",
            vec![leg(agent_id, -(cents as i64), 0)],
            chain_hash,
            ts,
        )?;
        Ok(snapshot)
    }

    /// Move payer funds from `available` into `escrowLocked`.
    pub fn lock_escrow(
        &self,
        tenant_id: &str,
        payer_agent_id: &str,
        cents: Cents,
        chain_hash: &str,
        ts: u64,
    ) -> Result<WalletSnapshot, WalletError> {
        let handle = self.handle(tenant_id, payer_agent_id)?;
        let mut wallet = handle.lock();
        if wallet.available_cents < cents {
            return Err(WalletError::InsufficientFunds {
                needed_cents: cents,
                available_cents: wallet.available_cents,
            });
        }
        wallet.available_cents -= cents;
        wallet.escrow_locked_cents += cents;
        let snapshot = wallet.clone();
        drop(wallet);
        self.record(
            tenant_id,
            "lock_escrow",
            vec![leg(payer_agent_id, -(cents as i64), cents as i64)],
            chain_hash,
            ts,
        )?;
        Ok(snapshot)
    }

    /// Return escrow to the payer's `available` (void path).
    pub fn void_escrow(
        &self,
        tenant_id: &str,
        payer_agent_id: &str,
        cents: Cents,
        chain_hash: &str,
        ts: u64,
    ) -> Result<WalletSnapshot, WalletError> {
        let handle = self.handle(tenant_id, payer_agent_id)?;
        let mut wallet = handle.lock();
        if wallet.escrow_locked_cents < cents {
            return Err(WalletError::EscrowUnderflow {
                needed_cents: cents,
                locked_cents: wallet.escrow_locked_cents,
            });
        }
        wallet.escrow_locked_cents -= cents;
        wallet.available_cents += cents;
        let snapshot = wallet.clone();
        drop(wallet);
        self.record(
            tenant_id,
            "void_escrow",
            vec![leg(payer_agent_id, cents as i64, -(cents as i64))],
            chain_hash,
            ts,
        )?;
        Ok(snapshot)
    }

    /// Settle an escrowed amount: `released` to the payee's `available`,
    /// `refunded` back to the payer's `available`.
    pub fn release_escrow(
        &self,
        tenant_id: &str,
        payer_agent_id: &str,
        payee_agent_id: &str,
        released_cents: Cents,
        refunded_cents: Cents,
        chain_hash: &str,
        ts: u64,
    ) -> Result<(), WalletError> {
        let total = released_cents + refunded_cents;
        self.with_two(tenant_id, payer_agent_id, payee_agent_id, |payer, payee| {
            if payer.currency != payee.currency {
                return Err(WalletError::CurrencyMismatch {
                    payer_currency: payer.currency.clone(),
                    payee_currency: payee.currency.clone(),
                });
            }
            if payer.escrow_locked_cents < total {
                return Err(WalletError::EscrowUnderflow {
                    needed_cents: total,
                    locked_cents: payer.escrow_locked_cents,
                });
            }
            payer.escrow_locked_cents -= total;
            payer.available_cents += refunded_cents;
            payee.available_cents += released_cents;
            Ok(())
        })?;
        self.record(
            tenant_id,
            "release_escrow",
            vec![
                leg(payer_agent_id, refunded_cents as i64, -(total as i64)),
                leg(payee_agent_id, released_cents as i64, 0),
            ],
            chain_hash,
            ts,
        )
    }

    /// Claw released funds back from the payee to the payer (accepted
    /// refund after release).
    pub fn refund_released(
        &self,
        tenant_id: &str,
        payer_agent_id: &str,
        payee_agent_id: &str,
        cents: Cents,
        chain_hash: &str,
        ts: u64,
    ) -> Result<(), WalletError> {
        self.with_two(tenant_id, payer_agent_id, payee_agent_id, |payer, payee| {
            if payer.currency != payee.currency {
                return Err(WalletError::CurrencyMismatch {
                    payer_currency: payer.currency.clone(),
                    payee_currency: payee.currency.clone(),
                });
            }
            if payee.available_cents < cents {
                return Err(WalletError::InsufficientFunds {
                    needed_cents: cents,
                    available_cents: payee.available_cents,
                });
            }
            payee.available_cents -= cents;
            payer.available_cents += cents;
            Ok(())
        })?;
        self.record(
            tenant_id,
            "refund_released",
            vec![
                leg(payee_agent_id, -(cents as i64), 0),
                leg(payer_agent_id, cents as i64, 0),
            ],
            chain_hash,
            ts,
        )
    }

    /// Full journal for a tenant, oldest first.
    pub fn journal(&self, tenant_id: &str) -> Vec<JournalEntry> {
        self.journal
            .lock()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    fn handle(&self, tenant_id: &str, agent_id: &str) -> Result<Arc<Mutex<Wallet>>, WalletError> {
        self.wallets
            .get(&(tenant_id.to_string(), agent_id.to_string()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| WalletError::WalletNotFound {
                agent_id: agent_id.to_string(),
            })
    }

    /// Run `f` with both wallets locked, acquiring in sorted key order.
    fn with_two<R>(
        &self,
        tenant_id: &str,
        a_agent: &str,
        b_agent: &str,
        f: impl FnOnce(&mut Wallet, &mut Wallet) -> Result<R, WalletError>,
    ) -> Result<R, WalletError> {
        if a_agent == b_agent {
            return Err(WalletError::SelfTransfer);
        }
        let a_handle = self.handle(tenant_id, a_agent)?;
        let b_handle = self.handle(tenant_id, b_agent)?;
        // Deadlock avoidance: always lock the lower (tenant, agent) key first.
        if a_agent < b_agent {
            let mut a = a_handle.lock();
            let mut b = b_handle.lock();
            f(&mut a, &mut b)
        } else {
            let mut b = b_handle.lock();
            let mut a = a_handle.lock();
            f(&mut a, &mut b)
        }
    }

    fn record(
        &self,
        tenant_id: &str,
        op: &str,
        legs: Vec<JournalLeg>,
        chain_hash: &str,
        ts: u64,
    ) -> Result<(), WalletError> {
        if !matches!(op, "credit" | "debit") {
            check_conservation(&legs)?;
        }
        debug!(tenant_id, op, chain_hash, "wallet movement");
        self.journal.lock().push(JournalEntry {
            entry_id: format!("jnl_{}", Uuid::new_v4().simple()),
            tenant_id: tenant_id.to_string(),
            op: op.to_string(),
            legs,
            chain_hash: chain_hash.to_string(),
            ts,
        });
        Ok(())
    }
}

fn leg(agent_id: &str, available_delta: i64, escrow_delta: i64) -> JournalLeg {
    JournalLeg {
        agent_id: agent_id.to_string(),
        available_delta,
        escrow_delta,
    }
}
