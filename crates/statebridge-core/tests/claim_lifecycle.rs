use ed25519_dalek::SigningKey;
use proptest::prelude::*;
use statebridge_core::address::SIGNATURE_LEN;
use statebridge_core::claim::{ClaimAccount, ClaimApplication, ClaimMultiSig};
use statebridge_core::fees::SIG_VERIFY_GAS_DESCRIPTOR;
use statebridge_core::{
    consolidate, import_bundle, process_claim_tx, sign, sign_multi, verify, Amount, ClaimKind,
    ClaimLedger, ClaimMessage, ClaimRejection, ClaimTx, ClaimableAccount, CollectorOptions,
    ConsolidatedState, DestAddress, GasMeter, ImportBundle, JsonFileRepository, LegacyPublicKey,
    MemoryRepository, MigrationParams, Repository, SignatureError, StateExport,
};

fn key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

fn public(seed: u8) -> LegacyPublicKey {
    LegacyPublicKey::from(key(seed).verifying_key())
}

fn dest(data: &str) -> DestAddress {
    DestAddress::parse(&format!("dest1{data}")).expect("dest")
}

fn account_claim(seed: u8, to: &str) -> ClaimMessage {
    sign(ClaimAccount::new(dest(to), public(seed)).into(), &key(seed)).expect("sign")
}

fn bundle_from_export(json: serde_json::Value) -> ImportBundle {
    let bytes = serde_json::to_vec(&json).expect("encode");
    let export = StateExport::from_slice(&bytes).expect("export");
    let (state, _) = consolidate(&export, CollectorOptions::default()).expect("collect");
    ImportBundle::new(state).expect("bundle")
}

fn ledger_for(records: Vec<ClaimableAccount>) -> ClaimLedger<MemoryRepository> {
    let bundle = ImportBundle::new(ConsolidatedState { accounts: records }).expect("bundle");
    let mut repo = MemoryRepository::new();
    import_bundle(&mut repo, &bundle).expect("import");
    ClaimLedger::new(repo, MigrationParams::default()).expect("ledger")
}

#[test]
fn export_to_claim_on_file_backed_ledger() {
    let bundle = bundle_from_export(serde_json::json!({
        "accounts": [{
            "type": "posmint/Account",
            "value": {
                "address": public(1).address().to_hex(),
                "coins": [{"denom": "ulegacy", "amount": "100"}],
                "public_key": public(1).to_string()
            }
        }],
        "applications": [],
        "nodes": []
    }));
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut repo = JsonFileRepository::open(dir.path()).expect("open");
        import_bundle(&mut repo, &bundle).expect("import");
    }

    let repo = JsonFileRepository::open(dir.path()).expect("reopen");
    let mut ledger = ClaimLedger::new(repo, MigrationParams::default()).expect("ledger");
    let event = ledger
        .process_claim(&account_claim(1, "qqqqqqqq"), 5)
        .expect("claim");
    assert_eq!(event.payout.total, Amount::from(100));

    let reopened = JsonFileRepository::open(dir.path()).expect("reopen");
    let record = reopened
        .get(&public(1).address())
        .expect("get")
        .expect("record");
    assert!(record.is_claimed());
    assert_eq!(record.dest_address, dest("qqqqqqqq"));
}

#[test]
fn account_claim_against_application_record_names_application_variant() {
    let mut record = ClaimableAccount::new(public(2).address());
    record.unstaked_balance = Amount::from(100);
    record.app_stake = Amount::from(50);
    let mut ledger = ledger_for(vec![record]);

    let err = ledger
        .process_claim(&account_claim(2, "qqqqqqqq"), 3)
        .expect_err("wrong actor");
    assert!(matches!(
        err,
        ClaimRejection::WrongActorType {
            required: ClaimKind::Application,
            ..
        }
    ));
    assert!(err.to_string().contains(ClaimKind::Application.command()));

    let fixed = sign(
        ClaimApplication::new(dest("qqqqqqqq"), public(2), "anvil", None).into(),
        &key(2),
    )
    .expect("sign");
    let event = ledger.process_claim(&fixed, 3).expect("application claim");
    assert_eq!(event.payout.staked, Amount::from(50));
    assert_eq!(event.payout.liquid, Amount::from(100));
}

#[test]
fn second_claim_in_same_block_is_replay_and_pays_gas() {
    let mut record = ClaimableAccount::new(public(3).address());
    record.unstaked_balance = Amount::from(10);
    let mut ledger = ledger_for(vec![record]);
    let height = 42;

    let mut first_gas = GasMeter::new();
    let first = process_claim_tx(
        &mut ledger,
        &ClaimTx::single(account_claim(3, "qqqqqqqq")),
        height,
        &mut first_gas,
    );
    assert!(first.result.is_ok());
    assert_eq!(first_gas.consumed(), 0);

    let mut second_gas = GasMeter::new();
    let second = process_claim_tx(
        &mut ledger,
        &ClaimTx::single(account_claim(3, "pppppppp")),
        height,
        &mut second_gas,
    );
    let rejection = second.result.expect_err("replay");
    assert!(matches!(
        rejection.rejection,
        ClaimRejection::AlreadyClaimed { claimed_at_height: 42, .. }
    ));
    assert!(second.waiver_revoked);
    assert_eq!(second_gas.consumed(), MigrationParams::default().sig_verify_cost);
    assert_eq!(second_gas.charges()[0].descriptor, SIG_VERIFY_GAS_DESCRIPTOR);

    let stored = ledger
        .get(&public(3).address())
        .expect("get")
        .expect("record");
    assert_eq!(stored.dest_address, dest("qqqqqqqq"));
}

#[test]
fn multisig_claim_redeems_joint_account() {
    let keys = [key(4), key(5), key(6)];
    let publics = vec![public(4), public(5), public(6)];
    let msg = ClaimMultiSig::new(dest("qqqqqqqq"), publics).expect("msg");
    let mut record = ClaimableAccount::new(msg.legacy_src_address);
    record.unstaked_balance = Amount::from(77);
    let mut ledger = ledger_for(vec![record]);

    let signed = sign_multi(msg, &keys).expect("sign");
    let event = ledger
        .process_claim(&ClaimMessage::from(signed), 9)
        .expect("claim");
    assert_eq!(event.kind, ClaimKind::MultiSig);
    assert_eq!(event.payout.liquid, Amount::from(77));
}

fn dest_data() -> impl Strategy<Value = String> {
    let charset = "qpzry9x8gf2tvdw0s3jn54khce6mua7l".as_bytes().to_vec();
    prop::collection::vec(prop::sample::select(charset), 6..20)
        .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn signature_roundtrip_and_tamper(
        seed in 1u8..=255,
        data in dest_data(),
        service in "[a-z]{1,12}",
        flip_at in 0usize..SIGNATURE_LEN,
        flip_bit in 0u8..8,
    ) {
        let msg = sign(
            ClaimApplication::new(dest(&data), public(seed), service.clone(), None).into(),
            &key(seed),
        ).expect("sign");
        prop_assert!(verify(&msg).is_ok());

        let ClaimMessage::Application(mut bad_sig) = msg.clone() else {
            return Err(TestCaseError::fail("variant changed"));
        };
        bad_sig.legacy_signature[flip_at] ^= 1 << flip_bit;
        prop_assert!(verify(&ClaimMessage::from(bad_sig)).is_err());

        let ClaimMessage::Application(mut bad_body) = msg else {
            return Err(TestCaseError::fail("variant changed"));
        };
        bad_body.service_id.push('x');
        prop_assert!(verify(&ClaimMessage::from(bad_body)).is_err());
    }

    #[test]
    fn multisig_rejects_any_other_length(
        n in 1usize..5,
        len in 0usize..400,
    ) {
        prop_assume!(len != SIGNATURE_LEN * n);
        let publics: Vec<_> = (1..=n as u8).map(public).collect();
        let mut msg = ClaimMultiSig::new(dest("qqqqqqqq"), publics).expect("msg");
        msg.legacy_signature = vec![0u8; len];
        prop_assert_eq!(
            verify(&ClaimMessage::from(msg)),
            Err(SignatureError::WrongLength { expected: SIGNATURE_LEN * n, actual: len })
        );
    }

    #[test]
    fn claimed_record_stays_claimed(
        attempts in prop::collection::vec((1u8..=3, dest_data(), any::<bool>()), 1..6),
    ) {
        let mut record = ClaimableAccount::new(public(1).address());
        record.unstaked_balance = Amount::from(5);
        let mut ledger = ledger_for(vec![record]);
        ledger.process_claim(&account_claim(1, "qqqqqqqq"), 1).expect("first claim");

        for (signer, data, signed) in attempts {
            let mut unsigned = ClaimAccount::new(dest(&data), public(1));
            if !signed {
                unsigned.legacy_signature = vec![0u8; 3];
            }
            let msg: ClaimMessage = if signed {
                sign(unsigned.into(), &key(signer)).expect("sign")
            } else {
                unsigned.into()
            };
            let outcome = ledger.process_claim(&msg, 2);
            let is_already_claimed = matches!(outcome, Err(ClaimRejection::AlreadyClaimed { .. }));
            prop_assert!(is_already_claimed);
        }
        let record = ledger.get(&public(1).address()).expect("get").expect("record");
        prop_assert_eq!(record.claimed_at_height, 1);
    }
}
