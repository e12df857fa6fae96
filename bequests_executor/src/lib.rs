//! Parses WILL.md, validates it, and executes its bequests one asset at a
//! time — fixed-amount transfers first (scaled down together if they
//! overcommit the asset's balance), then the single `remaining_balance` or
//! `all` transfer that absorbs whatever is left.
//!
//! Each execution step produces a [`TransferRecord`], successful or not, so
//! the caller can journal every attempt the way [`lifecycle_store`] journals
//! soul writes.

use std::collections::{BTreeSet, HashMap};

use error_types::{LifecycleError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

static RECIPIENT_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BequestAmount {
    /// A fixed quantity of `asset`. Subject to proportional scaling if the
    /// asset's fixed transfers overcommit the available balance.
    Fixed(f64),
    /// Whatever remains in `asset` after every fixed transfer has run. At
    /// most one per asset.
    RemainingBalance,
    /// Claims the asset's entire balance, unscaled — its presence for an
    /// asset disables scaling of that asset's fixed transfers, since an
    /// unconstrained claim already absorbs any shortfall.
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BequestEntry {
    pub recipient: String,
    pub asset: String,
    pub chain: String,
    pub amount: BequestAmount,
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Will {
    pub entries: Vec<BequestEntry>,
}

/// Parse WILL.md's line-oriented format:
/// `- <recipient> | <asset> | <chain> | fixed:<amount>|remaining_balance|all [| <note>]`
///
/// Entries missing any of the first four fields are dropped rather than
/// erroring the whole parse — a hand-edited will with one bad line should
/// still yield every other entry.
pub fn parse_will(markdown: &str) -> std::result::Result<Will, String> {
    let mut entries = Vec::new();
    for raw_line in markdown.lines() {
        let line = raw_line.trim().trim_start_matches('-').trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 4 {
            continue;
        }
        let Ok(amount) = parse_amount(fields[3]) else {
            continue;
        };
        entries.push(BequestEntry {
            recipient: fields[0].to_string(),
            asset: fields[1].to_string(),
            chain: fields[2].to_string(),
            amount,
            note: fields.get(4).map(|s| s.to_string()).unwrap_or_default(),
        });
    }
    Ok(Will { entries })
}

fn parse_amount(raw: &str) -> std::result::Result<BequestAmount, String> {
    match raw {
        "remaining_balance" => Ok(BequestAmount::RemainingBalance),
        "all" => Ok(BequestAmount::All),
        _ => {
            let rest = raw.strip_prefix("fixed:").unwrap_or(raw);
            rest.parse::<f64>()
                .map(BequestAmount::Fixed)
                .map_err(|_| format!("unrecognized amount spec: {raw}"))
        }
    }
}

/// Validate a will: recipients look like wallet addresses, fixed amounts
/// are positive, and each asset claims at most one open-ended
/// (`remaining_balance` or `all`) entry.
pub fn validate(will: &Will, max_transfers: u32) -> Result<()> {
    if will.entries.len() > max_transfers as usize {
        return Err(LifecycleError::BequestValidationFailed(format!(
            "will has {} entries, exceeds the configured maximum of {max_transfers}",
            will.entries.len()
        )));
    }

    for entry in &will.entries {
        if !RECIPIENT_ADDRESS.is_match(&entry.recipient) {
            return Err(LifecycleError::BequestValidationFailed(format!(
                "recipient \"{}\" is not a valid wallet address",
                entry.recipient
            )));
        }
        if let BequestAmount::Fixed(amount) = entry.amount {
            if amount <= 0.0 {
                return Err(LifecycleError::BequestValidationFailed(format!(
                    "fixed amount for {} must be positive, got {amount}",
                    entry.recipient
                )));
            }
        }
    }

    for asset in assets_of(will) {
        let open_ended = will
            .entries
            .iter()
            .filter(|e| e.asset == asset)
            .filter(|e| matches!(e.amount, BequestAmount::RemainingBalance | BequestAmount::All))
            .count();
        if open_ended > 1 {
            return Err(LifecycleError::BequestValidationFailed(format!(
                "asset {asset} has {open_ended} open-ended (remaining_balance/all) entries, at most one is allowed"
            )));
        }
    }

    Ok(())
}

fn assets_of(will: &Will) -> Vec<String> {
    will.entries
        .iter()
        .map(|e| e.asset.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub recipient: String,
    pub asset: String,
    pub amount: f64,
    pub tx_hash: Option<String>,
    pub succeeded: bool,
    pub error: Option<String>,
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Execute `will` against each asset's available balance (looked up in
/// `balances`, defaulting to `0.0` for an asset the will doesn't cover),
/// deducting `gas_fee` from each successful transfer. Fixed entries execute
/// first, scaled down together if they overcommit the asset; the asset's
/// open-ended entry, if any, executes last and takes what's left.
pub fn execute(
    will: &Will,
    balances: &HashMap<String, f64>,
    gas_fee: f64,
) -> Vec<TransferRecord> {
    let mut records = Vec::new();

    for asset in assets_of(will) {
        let balance = *balances.get(&asset).unwrap_or(&0.0);
        let entries: Vec<&BequestEntry> = will.entries.iter().filter(|e| e.asset == asset).collect();

        let has_all = entries.iter().any(|e| matches!(e.amount, BequestAmount::All));
        let fixed_sum: f64 = entries
            .iter()
            .filter_map(|e| match e.amount {
                BequestAmount::Fixed(a) => Some(a),
                _ => None,
            })
            .sum();
        let scale = if !has_all && fixed_sum > balance && fixed_sum > 0.0 {
            balance / fixed_sum
        } else {
            1.0
        };

        let mut remaining = balance;
        for entry in entries.iter().filter(|e| matches!(e.amount, BequestAmount::Fixed(_))) {
            let BequestAmount::Fixed(raw) = entry.amount else {
                unreachable!()
            };
            let amount = round6(raw * scale);
            records.push(attempt_transfer(entry, amount, gas_fee, &mut remaining));
        }

        for entry in entries
            .iter()
            .filter(|e| matches!(e.amount, BequestAmount::RemainingBalance | BequestAmount::All))
        {
            let amount = round6((remaining - gas_fee).max(0.0));
            records.push(attempt_transfer(entry, amount, gas_fee, &mut remaining));
        }
    }

    records
}

fn attempt_transfer(
    entry: &BequestEntry,
    amount: f64,
    gas_fee: f64,
    remaining: &mut f64,
) -> TransferRecord {
    let total_needed = amount + gas_fee;
    if amount <= 0.0 || total_needed > *remaining + 1e-9 {
        return TransferRecord {
            recipient: entry.recipient.clone(),
            asset: entry.asset.clone(),
            amount: 0.0,
            tx_hash: None,
            succeeded: false,
            error: Some(format!(
                "insufficient {} balance: needed {total_needed} (incl. gas), had {remaining}",
                entry.asset
            )),
        };
    }
    *remaining -= total_needed;
    TransferRecord {
        recipient: entry.recipient.clone(),
        asset: entry.asset.clone(),
        amount,
        tx_hash: Some(simulated_tx_hash(entry, amount)),
        succeeded: true,
        error: None,
    }
}

fn simulated_tx_hash(entry: &BequestEntry, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.recipient.as_bytes());
    hasher.update(entry.asset.as_bytes());
    hasher.update(amount.to_bits().to_be_bytes());
    let digest: String = hasher.finalize().iter().map(|b| format!("{b:02x}")).collect();
    format!("0x{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(recipient: &str, asset: &str, amount: BequestAmount) -> BequestEntry {
        BequestEntry {
            recipient: recipient.to_string(),
            asset: asset.to_string(),
            chain: "ethereum".to_string(),
            amount,
            note: String::new(),
        }
    }

    fn valid_address(n: u8) -> String {
        format!("0x{:040x}", n)
    }

    #[test]
    fn parses_fixed_remaining_balance_and_all_entries() {
        let markdown = format!(
            "- {} | USDC | ethereum | fixed:70 | for the garden\n- {} | USDC | ethereum | remaining_balance\n- {} | ETH | ethereum | all\n",
            valid_address(1),
            valid_address(2),
            valid_address(3),
        );
        let will = parse_will(&markdown).unwrap();
        assert_eq!(will.entries.len(), 3);
        assert!(matches!(will.entries[0].amount, BequestAmount::Fixed(f) if (f - 70.0).abs() < 1e-9));
        assert!(matches!(will.entries[1].amount, BequestAmount::RemainingBalance));
        assert!(matches!(will.entries[2].amount, BequestAmount::All));
    }

    #[test]
    fn validate_rejects_malformed_recipient() {
        let will = Will {
            entries: vec![entry("not-an-address", "USDC", BequestAmount::Fixed(10.0))],
        };
        assert!(validate(&will, 5).is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_fixed_amount() {
        let will = Will {
            entries: vec![entry(&valid_address(1), "USDC", BequestAmount::Fixed(0.0))],
        };
        assert!(validate(&will, 5).is_err());
    }

    #[test]
    fn validate_rejects_two_open_ended_entries_on_the_same_asset() {
        let will = Will {
            entries: vec![
                entry(&valid_address(1), "USDC", BequestAmount::RemainingBalance),
                entry(&valid_address(2), "USDC", BequestAmount::All),
            ],
        };
        assert!(validate(&will, 5).is_err());
    }

    #[test]
    fn fixed_transfers_scale_down_when_they_overcommit_the_balance() {
        let markdown = format!(
            "- {} | USDC | ethereum | fixed:70\n- {} | USDC | ethereum | fixed:60\n",
            valid_address(1),
            valid_address(2),
        );
        let will = parse_will(&markdown).unwrap();
        let balances = HashMap::from([("USDC".to_string(), 100.0)]);
        let records = execute(&will, &balances, 0.0);

        let scale = 100.0 / 130.0;
        assert!((records[0].amount - round6(70.0 * scale)).abs() < 1e-6);
        assert!((records[1].amount - round6(60.0 * scale)).abs() < 1e-6);
        assert!(records.iter().all(|r| r.succeeded));
    }

    #[test]
    fn an_all_entry_disables_scaling_for_its_asset() {
        let markdown = format!(
            "- {} | USDC | ethereum | fixed:70\n- {} | USDC | ethereum | all\n",
            valid_address(1),
            valid_address(2),
        );
        let will = parse_will(&markdown).unwrap();
        let balances = HashMap::from([("USDC".to_string(), 1000.0)]);
        let records = execute(&will, &balances, 0.0);

        assert!((records[0].amount - 70.0).abs() < 1e-9);
        assert!((records[1].amount - 930.0).abs() < 1e-9);
    }

    #[test]
    fn remaining_balance_entry_takes_whatever_is_left_after_gas() {
        let markdown = format!(
            "- {} | USDC | ethereum | fixed:40\n- {} | USDC | ethereum | remaining_balance\n",
            valid_address(1),
            valid_address(2),
        );
        let will = parse_will(&markdown).unwrap();
        let balances = HashMap::from([("USDC".to_string(), 100.0)]);
        let records = execute(&will, &balances, 5.0);

        assert!((records[0].amount - 40.0).abs() < 1e-9);
        // 100 - 40 - 5 (fixed's gas) = 55 remaining, minus 5 gas for the open-ended transfer = 50.
        assert!((records[1].amount - 50.0).abs() < 1e-9);
    }

    #[test]
    fn marks_transfer_failed_when_funds_run_out() {
        let markdown = format!(
            "- {} | USDC | ethereum | fixed:40\n",
            valid_address(1),
        );
        let will = parse_will(&markdown).unwrap();
        let balances = HashMap::from([("USDC".to_string(), 10.0)]);
        let records = execute(&will, &balances, 0.0);
        assert!(!records[0].succeeded);
        assert!(records[0].error.is_some());
    }
}
