//! Pairwise ledger-entry ↔ chain-transaction discrepancy classification

use crate::config::Config;
use crate::types::{Discrepancy, DiscrepancyKind};
use chrono::Utc;
use ledger_engine::LedgerEntry;
use ports::traits::ChainTx;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use uuid::Uuid;

fn discrepancy(kind: DiscrepancyKind, entry: Option<&LedgerEntry>, chain_tx: Option<&ChainTx>, detail: impl Into<String>) -> Discrepancy {
    Discrepancy {
        discrepancy_id: Uuid::new_v4(),
        kind,
        entry_id: entry.map(|e| e.entry_id),
        chain_tx_hash: entry
            .and_then(|e| e.chain_tx_hash.clone())
            .or_else(|| chain_tx.map(|t| t.tx_hash.clone())),
        ledger_amount_minor: entry.map(|e| entry_amount_minor(e)),
        chain_amount_minor: chain_tx.map(|t| t.amount_minor),
        detail: detail.into(),
        detected_at: Utc::now(),
    }
}

/// `LedgerEntry::amount`/`fee` are `Decimal`; minor units are always
/// integral once scaled, so this truncates only in the pathological case
/// of a currency with more decimal places than the entry records.
fn entry_amount_minor(entry: &LedgerEntry) -> i128 {
    let scale = entry.amount.scale().max(2);
    let scaled = entry.amount * rust_decimal::Decimal::new(10i64.pow(scale), 0);
    scaled.to_i128().unwrap_or(0)
}

/// Classify one ledger entry (known to carry a `chain_tx_hash`) against
/// whatever the chain provider reported for that hash, if anything.
pub fn classify_pair(entry: &LedgerEntry, chain_tx: Option<&ChainTx>, config: &Config) -> Option<Discrepancy> {
    let chain_tx = match chain_tx {
        None => {
            return Some(discrepancy(
                DiscrepancyKind::MissingOnChain,
                Some(entry),
                None,
                "ledger entry has chain_tx_hash but provider has no record",
            ));
        }
        Some(tx) => tx,
    };

    if chain_tx.status == "failed" && entry.status == ledger_engine::EntryStatus::Confirmed {
        return Some(discrepancy(
            DiscrepancyKind::StatusMismatch,
            Some(entry),
            Some(chain_tx),
            format!("chain reports '{}' while ledger is confirmed", chain_tx.status),
        ));
    }

    if entry.currency != chain_tx.token {
        return Some(discrepancy(
            DiscrepancyKind::CurrencyMismatch,
            Some(entry),
            Some(chain_tx),
            format!("ledger currency {} != chain token {}", entry.currency, chain_tx.token),
        ));
    }

    let ledger_minor = entry_amount_minor(entry);
    let chain_minor = chain_tx.amount_minor;
    let delta = (ledger_minor - chain_minor).abs();
    if delta > config.auto_resolve_threshold_minor {
        let largest = ledger_minor.abs().max(chain_minor.abs()).max(1);
        let ratio = delta as f64 / largest as f64;
        if ratio > config.amount_tolerance {
            return Some(discrepancy(
                DiscrepancyKind::AmountMismatch,
                Some(entry),
                Some(chain_tx),
                format!("ledger {ledger_minor} vs chain {chain_minor}, ratio {ratio:.6}"),
            ));
        }
    }

    if let (Some(confirmed_at), Some(chain_confirmed_at)) = (entry.confirmed_at, chain_tx.confirmed_at) {
        let skew = (confirmed_at - chain_confirmed_at).num_seconds().abs();
        if skew > config.timing_skew_seconds {
            return Some(discrepancy(
                DiscrepancyKind::TimingDiscrepancy,
                Some(entry),
                Some(chain_tx),
                format!("confirmation timestamps differ by {skew}s"),
            ));
        }
    }

    None
}

/// Entries sharing one `chain_tx_hash` are always a discrepancy,
/// independent of what the chain itself reports.
pub fn find_duplicates(entries: &[LedgerEntry]) -> Vec<Discrepancy> {
    let mut by_hash: HashMap<&str, Vec<&LedgerEntry>> = HashMap::new();
    for entry in entries {
        if let Some(hash) = entry.chain_tx_hash.as_deref() {
            by_hash.entry(hash).or_default().push(entry);
        }
    }

    by_hash
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .flat_map(|(hash, group)| {
            let count = group.len();
            group.into_iter().map(move |entry| {
                discrepancy(
                    DiscrepancyKind::DuplicateEntry,
                    Some(entry),
                    None,
                    format!("{count} ledger entries share chain_tx_hash {hash}"),
                )
            })
        })
        .collect()
}

/// Chain transactions against managed addresses that have no ledger
/// entry at all. `managed_addresses` is the platform's own set of
/// settlement/treasury addresses; anything else is out of scope.
pub fn find_missing_in_ledger(
    known_chain_txs: &[ChainTx],
    managed_addresses: &[String],
    ledger_hashes: &std::collections::HashSet<String>,
) -> Vec<Discrepancy> {
    known_chain_txs
        .iter()
        .filter(|tx| managed_addresses.iter().any(|addr| addr == &tx.destination))
        .filter(|tx| !ledger_hashes.contains(&tx.tx_hash))
        .map(|tx| {
            discrepancy(
                DiscrepancyKind::MissingInLedger,
                None,
                Some(tx),
                format!("chain tx {} to managed address {} has no ledger entry", tx.tx_hash, tx.destination),
            )
        })
        .collect()
}
