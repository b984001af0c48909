//! Claimant list loading.
//!
//! Two shapes are accepted:
//! ```json
//! [{ "address": "terra1...", "amount": "250000000" }]
//! ```
//! and the legacy data-drop form, where amounts may be JSON integers:
//! ```json
//! { "data": [["terra1...", 250000000], ["terra1...", "1"]] }
//! ```

use std::{fs, path::Path};

use airdrop_proof_core::ClaimantRecord;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct LegacyClaimantList {
    data: Vec<(String, Value)>,
}

/// Load claimant records from a JSON file, preserving file order.
pub fn load_claimants(path: &Path) -> Result<Vec<ClaimantRecord>> {
    let raw =
        fs::read(path).with_context(|| format!("failed reading claimants {}", path.display()))?;
    let records = parse_claimants(&raw)
        .with_context(|| format!("failed parsing claimants {}", path.display()))?;
    tracing::info!(path = %path.display(), claimants = records.len(), "loaded claimant list");
    Ok(records)
}

pub fn parse_claimants(raw: &[u8]) -> Result<Vec<ClaimantRecord>> {
    let record_err = match serde_json::from_slice::<Vec<ClaimantRecord>>(raw) {
        Ok(native) => return Ok(native),
        Err(err) => err,
    };

    let legacy: LegacyClaimantList = serde_json::from_slice(raw).with_context(|| {
        format!("neither a record array ({record_err}) nor a legacy data list")
    })?;
    legacy
        .data
        .into_iter()
        .enumerate()
        .map(|(row, (address, amount))| {
            let amount = legacy_amount(&amount).with_context(|| format!("row {row} ({address})"))?;
            Ok(ClaimantRecord { address, amount })
        })
        .collect()
}

fn legacy_amount(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => {
            let digits = n.to_string();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                bail!("amount must be a non-negative integer, got {n}");
            }
            digits
                .parse::<u128>()
                .with_context(|| format!("amount {digits} does not fit in 128 bits"))?;
            Ok(digits)
        }
        other => bail!("unsupported amount value: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_array() {
        let raw = br#"[
            {"address": "terra17lmam6zguazs5q5u6z5mmx76uj63gldnse2pdp", "amount": "250000000"},
            {"address": "terra1qqqqqqqqqqqqqqqq", "amount": "1"}
        ]"#;
        let records = parse_claimants(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].amount, "1");
    }

    #[test]
    fn parses_legacy_data_with_mixed_amounts() {
        let raw = br#"{"data": [
            ["0x1111111111111111111111111111111111111111", 50000000],
            ["0x2222222222222222222222222222222222222222", "71000000"]
        ]}"#;
        let records = parse_claimants(raw).unwrap();
        assert_eq!(
            records,
            vec![
                ClaimantRecord::new("0x1111111111111111111111111111111111111111", "50000000"),
                ClaimantRecord::new("0x2222222222222222222222222222222222222222", "71000000"),
            ]
        );
    }

    #[test]
    fn rejects_fractional_or_negative_legacy_amounts() {
        for raw in [
            &br#"{"data": [["terra1qqqqqqqqqq", 1.5]]}"#[..],
            &br#"{"data": [["terra1qqqqqqqqqq", -3]]}"#[..],
            &br#"{"data": [["terra1qqqqqqqqqq", null]]}"#[..],
        ] {
            assert!(parse_claimants(raw).is_err());
        }
    }

    #[test]
    fn legacy_amounts_above_u64_stay_exact() {
        let raw = br#"{"data": [["terra1qqqqqqqqqq", 100000000000000000000]]}"#;
        let records = parse_claimants(raw).unwrap();
        assert_eq!(records[0].amount, "100000000000000000000");

        let too_large = format!(r#"{{"data": [["terra1qqqqqqqqqq", {}]]}}"#, "9".repeat(40));
        assert!(parse_claimants(too_large.as_bytes()).is_err());
    }

    #[test]
    fn malformed_record_array_keeps_its_error() {
        let raw = br#"[{"address": "terra1qqqqqqqqqq"}]"#;
        let err = parse_claimants(raw).unwrap_err();
        assert!(format!("{err:#}").contains("missing field `amount`"));
    }

    #[test]
    fn rejects_unknown_shape() {
        assert!(parse_claimants(br#"{"claimants": []}"#).is_err());
        assert!(parse_claimants(b"not json").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claimants.json");
        fs::write(&path, r#"{"data": [["terra1qqqqqqqqqq", 7]]}"#).unwrap();
        let records = load_claimants(&path).unwrap();
        assert_eq!(records, vec![ClaimantRecord::new("terra1qqqqqqqqqq", "7")]);
        assert!(load_claimants(&dir.path().join("missing.json")).is_err());
    }
}
