use std::path::{Path, PathBuf};

use airdrop_proof_core::{
    address_from_secret_key, claim_message, sign_message, strip_hex_prefix, ClaimantRecord,
    ForeignScheme, LeafScheme, NativeScheme, RootSet, ShardConfig, ShardedTree,
};
use airdrop_prover_lib::{
    answer_signature_query, build_from_file, export_eligible_claimants, read_json, verify_claim,
    write_json, ClaimMsg, RootsPayload, SignatureQuery,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "airdrop-cli")]
#[command(about = "Build merkle roots and claim proofs for the airdrop")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ShardArgs {
    /// Number of merkle roots for the native claimant list.
    #[arg(long, env = "NATIVE_MERKLE_ROOTS", default_value_t = 2)]
    native_shards: u32,

    /// Number of merkle roots for the EVM claimant list.
    #[arg(long, env = "EVM_MERKLE_ROOTS", default_value_t = 2)]
    foreign_shards: u32,

    /// Require native addresses to carry this bech32 prefix.
    #[arg(long)]
    native_prefix: Option<String>,
}

impl ShardArgs {
    fn native_scheme(&self) -> NativeScheme {
        self.native_prefix
            .as_deref()
            .map_or_else(NativeScheme::new, NativeScheme::with_prefix)
    }

    fn config(&self, scheme: SchemeArg, base_index: u32) -> ShardConfig {
        let shards = match scheme {
            SchemeArg::Native => self.native_shards,
            SchemeArg::Foreign => self.foreign_shards,
        };
        ShardConfig::new(shards).with_base_index(base_index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SchemeArg {
    Native,
    Foreign,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build merkle roots from claimant lists and write the contract payload.
    Roots {
        #[arg(long)]
        native: Option<PathBuf>,
        #[arg(long)]
        foreign: Option<PathBuf>,
        /// Existing payload to extend with a new era of roots.
        #[arg(long)]
        append_to: Option<PathBuf>,
        #[arg(long, default_value = "build/airdrop/roots.json")]
        out: PathBuf,
        #[command(flatten)]
        shards: ShardArgs,
    },
    /// Build the claim message for one claimant.
    Prove {
        #[arg(long, value_enum)]
        scheme: SchemeArg,
        #[arg(long)]
        claimants: PathBuf,
        #[arg(long)]
        address: String,
        /// Native address receiving an EVM claimant's airdrop.
        #[arg(long, required_if_eq("scheme", "foreign"))]
        recipient: Option<String>,
        #[arg(long, env = "EVM_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,
        #[arg(long, default_value_t = 0)]
        base_index: u32,
        #[arg(long, default_value = "build/airdrop/claim.json")]
        out: PathBuf,
        #[command(flatten)]
        shards: ShardArgs,
    },
    /// Export proofs for every claimant of one list.
    ExportProofs {
        #[arg(long, value_enum)]
        scheme: SchemeArg,
        #[arg(long)]
        claimants: PathBuf,
        #[arg(long, default_value_t = 0)]
        base_index: u32,
        #[arg(long, default_value = "build/airdrop/eligible.json")]
        out: PathBuf,
        #[command(flatten)]
        shards: ShardArgs,
    },
    /// Check a claim message against a roots payload.
    VerifyClaim {
        #[arg(long, default_value = "build/airdrop/roots.json")]
        roots: PathBuf,
        #[arg(long, default_value = "build/airdrop/claim.json")]
        claim: PathBuf,
        /// Native address submitting the claim.
        #[arg(long)]
        sender: String,
        #[arg(long)]
        native_prefix: Option<String>,
    },
    /// Sign a claim message with an EVM key.
    Sign {
        #[arg(long, env = "EVM_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// Sign the claim message directing the airdrop to this native address.
        #[arg(long, required_unless_present = "message", conflicts_with = "message")]
        recipient: Option<String>,
        /// Sign an arbitrary message instead.
        #[arg(long)]
        message: Option<String>,
    },
    /// Recover the signer of a message hash and compare it with an address.
    VerifySignature {
        #[arg(long)]
        address: String,
        #[arg(long)]
        signature: String,
        #[arg(long)]
        msg_hash: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "airdrop_cli=info,airdrop_prover_lib=info,airdrop_proof_core=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Roots {
            native,
            foreign,
            append_to,
            out,
            shards,
        } => cmd_roots(
            native.as_deref(),
            foreign.as_deref(),
            append_to.as_deref(),
            &out,
            &shards,
        ),
        Command::Prove {
            scheme,
            claimants,
            address,
            recipient,
            private_key,
            base_index,
            out,
            shards,
        } => cmd_prove(
            scheme,
            &claimants,
            &address,
            recipient.as_deref(),
            private_key.as_deref(),
            shards.config(scheme, base_index),
            &shards,
            &out,
        ),
        Command::ExportProofs {
            scheme,
            claimants,
            base_index,
            out,
            shards,
        } => cmd_export_proofs(
            scheme,
            &claimants,
            shards.config(scheme, base_index),
            &shards,
            &out,
        ),
        Command::VerifyClaim {
            roots,
            claim,
            sender,
            native_prefix,
        } => cmd_verify_claim(&roots, &claim, &sender, native_prefix.as_deref()),
        Command::Sign {
            private_key,
            recipient,
            message,
        } => cmd_sign(&private_key, recipient.as_deref(), message.as_deref()),
        Command::VerifySignature {
            address,
            signature,
            msg_hash,
        } => cmd_verify_signature(&address, &signature, &msg_hash),
    }
}

fn cmd_roots(
    native_path: Option<&Path>,
    foreign_path: Option<&Path>,
    append_to: Option<&Path>,
    out: &Path,
    shards: &ShardArgs,
) -> Result<()> {
    if native_path.is_none() && foreign_path.is_none() {
        bail!("at least one of --native or --foreign is required");
    }

    let existing: RootsPayload = match append_to {
        Some(path) => read_json(path)?,
        None => RootsPayload::default(),
    };
    let mut native_roots = existing.native_roots()?;
    let mut foreign_roots = existing.foreign_roots()?;

    if let Some(path) = native_path {
        let config = shards.config(SchemeArg::Native, native_roots.next_index());
        let tree = build_from_file(shards.native_scheme(), path, config)?;
        native_roots.append(tree.root_set())?;
    }
    if let Some(path) = foreign_path {
        let config = shards.config(SchemeArg::Foreign, foreign_roots.next_index());
        let tree = build_from_file(ForeignScheme, path, config)?;
        foreign_roots.append(tree.root_set())?;
    }

    let payload = RootsPayload::from_root_sets(&native_roots, &foreign_roots)?;
    write_json(out, &payload)?;

    print_roots("terra_merkle_roots", &native_roots);
    print_roots("evm_merkle_roots", &foreign_roots);
    println!("Payload: {}", out.display());
    Ok(())
}

fn print_roots(label: &str, roots: &RootSet) {
    println!("{label}: {}", roots.len());
    for (index, root) in roots.iter() {
        println!("  [{index}] {}", hex::encode(root));
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_prove(
    scheme: SchemeArg,
    claimants: &Path,
    address: &str,
    recipient: Option<&str>,
    private_key: Option<&str>,
    config: ShardConfig,
    shards: &ShardArgs,
    out: &Path,
) -> Result<()> {
    let claim = match scheme {
        SchemeArg::Native => {
            let tree = build_from_file(shards.native_scheme(), claimants, config)?;
            let record = find_record(&tree, address)?;
            ClaimMsg::native(&record, &tree.prove_for(&record)?)
        }
        SchemeArg::Foreign => {
            let recipient = recipient.ok_or_else(|| anyhow!("--recipient is required"))?;
            let private_key = private_key
                .ok_or_else(|| anyhow!("--private-key or EVM_PRIVATE_KEY is required"))?;
            let secret = parse_private_key(private_key)?;

            let tree = build_from_file(ForeignScheme, claimants, config)?;
            let record = find_record(&tree, address)?;
            let signer = hex::encode(address_from_secret_key(&secret)?);
            if ForeignScheme.normalize_address(&record.address)? != signer {
                bail!("private key belongs to 0x{signer}, not {}", record.address);
            }

            let message = claim_message(&record.address, recipient)?;
            let bundle = sign_message(&secret, message.as_bytes())?;
            ClaimMsg::foreign(&record, &tree.prove_for(&record)?, &bundle)?
        }
    };

    write_json(out, &claim)?;
    println!("Claim for {address} at root index {}", claim.root_index());
    println!("Claim message: {}", out.display());
    Ok(())
}

fn cmd_export_proofs(
    scheme: SchemeArg,
    claimants: &Path,
    config: ShardConfig,
    shards: &ShardArgs,
    out: &Path,
) -> Result<()> {
    let rows = match scheme {
        SchemeArg::Native => {
            export_eligible_claimants(&build_from_file(shards.native_scheme(), claimants, config)?)?
        }
        SchemeArg::Foreign => {
            export_eligible_claimants(&build_from_file(ForeignScheme, claimants, config)?)?
        }
    };
    write_json(out, &rows)?;
    println!("Exported {} claimants: {}", rows.len(), out.display());
    Ok(())
}

fn cmd_verify_claim(
    roots: &Path,
    claim: &Path,
    sender: &str,
    native_prefix: Option<&str>,
) -> Result<()> {
    let payload: RootsPayload = read_json(roots)?;
    let claim: ClaimMsg = read_json(claim)?;
    let scheme = native_prefix.map_or_else(NativeScheme::new, NativeScheme::with_prefix);

    let check = verify_claim(&payload, &scheme, sender, &claim)?;
    println!("{}", serde_json::to_string_pretty(&check)?);
    if !check.is_valid() {
        bail!("claim rejected");
    }
    Ok(())
}

fn cmd_sign(private_key: &str, recipient: Option<&str>, message: Option<&str>) -> Result<()> {
    let secret = parse_private_key(private_key)?;
    let message = match (recipient, message) {
        (Some(recipient), _) => {
            let signer = hex::encode(address_from_secret_key(&secret)?);
            claim_message(&signer, recipient)?
        }
        (None, Some(message)) => message.to_string(),
        (None, None) => bail!("either --recipient or --message is required"),
    };

    let bundle = sign_message(&secret, message.as_bytes())?;
    tracing::info!(signer = %bundle.wire_address(), "signed message");

    println!("message: {message}");
    println!(
        "{}",
        serde_json::to_string_pretty(&SignatureQuery::from_bundle(&bundle))?
    );
    Ok(())
}

fn cmd_verify_signature(address: &str, signature: &str, msg_hash: &str) -> Result<()> {
    let query = SignatureQuery::IsValidSignature {
        evm_address: address.to_string(),
        evm_signature: signature.to_string(),
        signed_msg_hash: msg_hash.to_string(),
    };
    let verification = answer_signature_query(&query)?;
    println!("{}", serde_json::to_string_pretty(&verification)?);
    Ok(())
}

fn find_record<S: LeafScheme>(tree: &ShardedTree<S>, address: &str) -> Result<ClaimantRecord> {
    let wanted = tree.scheme().normalize_address(address)?;
    tree.records()
        .iter()
        .find(|record| {
            tree.scheme()
                .normalize_address(&record.address)
                .is_ok_and(|normalized| normalized == wanted)
        })
        .cloned()
        .ok_or_else(|| anyhow!("{address} is not in the claimant list"))
}

fn parse_private_key(value: &str) -> Result<[u8; 32]> {
    let mut secret = [0u8; 32];
    hex::decode_to_slice(strip_hex_prefix(value.trim()), &mut secret)
        .context("private key must be 32 bytes of hex")?;
    Ok(secret)
}
