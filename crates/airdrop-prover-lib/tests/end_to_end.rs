use std::fs;

use airdrop_prover_lib::{
    build_from_file, export_eligible_claimants, read_json, verify_claim, write_json, ClaimCheck,
    ClaimMsg, EligibleClaimant, RootsPayload,
};
use airdrop_proof_core::{
    address_from_secret_key, claim_message, sign_message, ClaimantRecord, ForeignScheme,
    LeafScheme, NativeScheme, ShardConfig, ShardedTree,
};

const NATIVE_CLAIMANTS: [(&str, &str); 4] = [
    ("terra1757tkx08n0cqrw7p86ny9lnxsqeth0wgp0em95", "250000000"),
    ("terra17lmam6zguazs5q5u6z5mmx76uj63gldnse2pdp", "1"),
    ("terra17mpuq65hw5kt7d44kpw4nk7x339xhznaa0duzv", "71000000000"),
    ("terra18qpjm4zkvqnpjpw0zn0tdr8gdzvt8au35v45xf", "1000000"),
];

fn native_records() -> Vec<ClaimantRecord> {
    NATIVE_CLAIMANTS
        .iter()
        .map(|(address, amount)| ClaimantRecord::new(*address, *amount))
        .collect()
}

#[test]
fn single_shard_native_claim() {
    let sharded =
        ShardedTree::build(NativeScheme::new(), native_records(), ShardConfig::new(1)).unwrap();
    let target = ClaimantRecord::new(NATIVE_CLAIMANTS[1].0, NATIVE_CLAIMANTS[1].1);

    let proof = sharded.prove_for(&target).unwrap();
    assert!(proof.siblings.len() > 1);
    assert_eq!(proof.root_index, 0);

    let leaf = NativeScheme::new().encode(&target).unwrap();
    assert!(sharded.root_set().verify(&leaf, &proof));

    let without_target: Vec<_> = native_records()
        .into_iter()
        .filter(|r| r.address != target.address)
        .collect();
    let other =
        ShardedTree::build(NativeScheme::new(), without_target, ShardConfig::new(1)).unwrap();
    assert!(!other.root_set().verify(&leaf, &proof));
}

#[test]
fn files_to_payload_to_verified_claims() {
    let dir = tempfile::tempdir().unwrap();
    let secret = [0x5a; 32];
    let signer = hex::encode(address_from_secret_key(&secret).unwrap());

    // native list in the legacy data-drop shape, amounts as integers
    let native_path = dir.path().join("terra_claimants.json");
    let legacy_rows: Vec<_> = NATIVE_CLAIMANTS
        .iter()
        .map(|(address, amount)| serde_json::json!([address, amount.parse::<u64>().unwrap()]))
        .collect();
    fs::write(
        &native_path,
        serde_json::to_vec(&serde_json::json!({ "data": legacy_rows })).unwrap(),
    )
    .unwrap();

    let foreign_path = dir.path().join("evm_claimants.json");
    let mut foreign_records: Vec<_> = (1..=7u8)
        .map(|i| {
            ClaimantRecord::new(
                format!("0x{}", hex::encode([i; 20])),
                (i as u32 * 1000).to_string(),
            )
        })
        .collect();
    foreign_records.push(ClaimantRecord::new(
        format!("0x{}", signer.to_uppercase()),
        "424242",
    ));
    fs::write(&foreign_path, serde_json::to_vec(&foreign_records).unwrap()).unwrap();

    let native =
        build_from_file(NativeScheme::with_prefix("terra"), &native_path, ShardConfig::new(2))
            .unwrap();
    let foreign = build_from_file(ForeignScheme, &foreign_path, ShardConfig::new(3)).unwrap();

    let roots_path = dir.path().join("out/roots.json");
    write_json(
        &roots_path,
        &RootsPayload::from_root_sets(&native.root_set(), &foreign.root_set()).unwrap(),
    )
    .unwrap();
    let payload: RootsPayload = read_json(&roots_path).unwrap();
    assert_eq!(payload.native.len(), 2);
    assert_eq!(payload.foreign.len(), 3);

    let scheme = NativeScheme::with_prefix("terra");
    for (address, amount) in NATIVE_CLAIMANTS {
        let record = ClaimantRecord::new(address, amount);
        let claim = ClaimMsg::native(&record, &native.prove_for(&record).unwrap());
        assert_eq!(
            verify_claim(&payload, &scheme, address, &claim).unwrap(),
            ClaimCheck::Valid
        );
    }

    // the signer lands in the last foreign shard
    let recipient = NATIVE_CLAIMANTS[2].0;
    let record = &foreign.records()[7];
    let proof = foreign.prove_for(record).unwrap();
    assert_eq!(proof.root_index, 2);
    let message = claim_message(&record.address, recipient).unwrap();
    let bundle = sign_message(&secret, message.as_bytes()).unwrap();
    let claim = ClaimMsg::foreign(record, &proof, &bundle).unwrap();
    assert_eq!(
        verify_claim(&payload, &scheme, recipient, &claim).unwrap(),
        ClaimCheck::Valid
    );

    // a proof for one scheme never verifies against the other's roots
    let misrouted = ClaimMsg::ClaimByTerraUser {
        claim_amount: record.amount.clone(),
        merkle_proof: proof.siblings_hex(),
        root_index: 0,
    };
    assert_eq!(
        verify_claim(&payload, &scheme, recipient, &misrouted).unwrap(),
        ClaimCheck::ProofMismatch
    );

    let export_path = dir.path().join("out/evm_eligible.json");
    write_json(&export_path, &export_eligible_claimants(&foreign).unwrap()).unwrap();
    let exported: Vec<EligibleClaimant> = read_json(&export_path).unwrap();
    assert_eq!(exported.len(), 8);
    assert_eq!(exported[7].index, 2);
    assert_eq!(exported[7].merkle_proof, proof.siblings_hex());
}
