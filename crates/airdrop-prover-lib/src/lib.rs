//! Airdrop prover library: claimant files, root payloads and claim messages.
//!
//! Wraps the pure algorithms of `airdrop-proof-core` with the JSON formats the
//! airdrop contract and the deployment tooling exchange, so the CLI and tests
//! share one implementation.

pub mod claim;
pub mod claimants;
pub mod messages;

use std::{fs, path::Path};

use airdrop_proof_core::{LeafScheme, ShardConfig, ShardedTree};
use anyhow::{anyhow, Context, Result};

pub use claim::{verify_claim, ClaimCheck};
pub use claimants::{load_claimants, parse_claimants};
pub use messages::{
    answer_signature_query, export_eligible_claimants, ClaimMsg, EligibleClaimant, RootsPayload,
    SignatureQuery,
};

/// Load a claimant file and build its shard trees.
pub fn build_from_file<S: LeafScheme>(
    scheme: S,
    path: &Path,
    config: ShardConfig,
) -> Result<ShardedTree<S>> {
    let records = load_claimants(path)?;
    ShardedTree::build(scheme, records, config)
        .with_context(|| format!("failed building merkle roots from {}", path.display()))
}

/// Write a value as pretty-printed JSON to a file.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let encoded = serde_json::to_vec_pretty(value).context("failed encoding json")?;
    fs::write(path, encoded).with_context(|| format!("failed writing json {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote json");
    Ok(())
}

/// Read a JSON file into `T`.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed parsing json {}", path.display()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("path has no parent: {}", path.display()))?;
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent)
        .with_context(|| format!("failed creating parent dir {}", parent.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_proof_core::ForeignScheme;

    #[test]
    fn write_json_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/roots.json");
        write_json(&path, &vec!["aa", "bb"]).unwrap();
        let back: Vec<String> = read_json(&path).unwrap();
        assert_eq!(back, vec!["aa", "bb"]);
    }

    #[test]
    fn build_from_file_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evm.json");
        fs::write(
            &path,
            r#"[{"address": "0x1111111111111111111111111111111111111111", "amount": "01"}]"#,
        )
        .unwrap();
        let err = build_from_file(ForeignScheme, &path, ShardConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("evm.json"));
    }
}
