//! Integration tests for the code and contract registries, calls and gas

mod common;

use common::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use veil_compute::keeper::CONTRACT_EVENT_TYPE;
use veil_compute::test_utils::{sign_tx, test_coins, test_context, TestAccount, TestSetup, TEST_WASM};
use veil_compute::{contract_address, GasMeter, KeeperError};
use veil_storage::MemoryStore;
use veil_types::Binary;

#[test]
fn test_code_ids_have_no_gaps() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();

    assert_eq!(store_code(&setup, &creator), 1);
    let rejected = setup
        .keeper
        .create(&setup.ctx, &creator.address, b"not wasm at all", "", "");
    assert!(matches!(rejected, Err(KeeperError::CreateFailed(_))));
    assert_eq!(store_code(&setup, &creator), 2);
    assert_eq!(setup.keeper.get_next_code_id(&setup.ctx).unwrap(), 3);
}

#[test]
fn test_stored_code_is_retrievable() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();
    let code_id = setup
        .keeper
        .create(&setup.ctx, &creator.address, TEST_WASM, "https://example.org/src", "veil/optimizer:1.0")
        .unwrap();

    let info = setup.keeper.get_code_info(&setup.ctx, code_id).unwrap().unwrap();
    assert_eq!(info.creator, creator.address);
    assert_eq!(info.source, "https://example.org/src");
    assert_eq!(info.builder, "veil/optimizer:1.0");
    assert_eq!(
        setup.keeper.get_byte_code(&setup.ctx, code_id).unwrap().unwrap(),
        TEST_WASM
    );
    assert!(setup.keeper.get_code_info(&setup.ctx, code_id + 1).unwrap().is_none());
    assert!(setup.keeper.get_byte_code(&setup.ctx, code_id + 1).unwrap().is_none());
}

#[test]
fn test_gzipped_code_is_stored_inflated() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(TEST_WASM).unwrap();
    let zipped = encoder.finish().unwrap();

    let code_id = setup
        .keeper
        .create(&setup.ctx, &creator.address, &zipped, "", "")
        .unwrap();
    assert_eq!(
        setup.keeper.get_byte_code(&setup.ctx, code_id).unwrap().unwrap(),
        TEST_WASM
    );
}

#[test]
fn test_code_requiring_unsupported_feature_is_rejected() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();
    let staking = b"\0asm\x01\x00\x00\x00requires_staking";
    let iterator = b"\0asm\x01\x00\x00\x00requires_iterator";

    assert!(setup.keeper.create(&setup.ctx, &creator.address, staking, "", "").is_ok());
    assert!(matches!(
        setup.keeper.create(&setup.ctx, &creator.address, iterator, "", ""),
        Err(KeeperError::CreateFailed(_))
    ));
}

#[test]
fn test_contract_address_is_deterministic() {
    let (setup, creator, first) = setup_with_contract(0);
    let second = instantiate(&setup, &creator, 1, None, "{}", "second", &test_coins(0)).unwrap();

    assert_eq!(first, contract_address(1, 1));
    assert_eq!(second, contract_address(1, 2));
    assert_ne!(first, second);
}

#[test]
fn test_instantiate_records_contract() {
    let (setup, creator, contract) = setup_with_contract(25);

    let info = setup.keeper.get_contract_info(&setup.ctx, &contract).unwrap().unwrap();
    assert_eq!(info.code_id, 1);
    assert_eq!(info.creator, creator.address);
    assert_eq!(info.admin, Some(creator.address));
    assert_eq!(info.label, "contract");
    assert_eq!(info.created.block_height, 1);

    assert_eq!(
        setup.keeper.get_contract_address(&setup.ctx, "contract").unwrap(),
        Some(contract)
    );
    let code_info = setup.keeper.get_code_info(&setup.ctx, 1).unwrap().unwrap();
    assert_eq!(
        setup.keeper.get_contract_hash(&setup.ctx, &contract).unwrap(),
        Some(code_info.code_hash_hex())
    );
    assert_eq!(
        setup.keeper.get_contract_key(&setup.ctx, &contract).unwrap().unwrap().len(),
        veil_enclave::CONTRACT_KEY_LEN
    );

    assert_eq!(balance(&setup, &contract), 25);
    assert_eq!(balance(&setup, &creator.address), 975);

    let events = setup.ctx.events().events();
    let wasm = events.iter().find(|e| e.ty == CONTRACT_EVENT_TYPE).unwrap();
    assert_eq!(wasm.attribute("contract_address"), Some(contract.to_string().as_str()));
}

#[test]
fn test_duplicate_label_is_rejected_before_transfer() {
    let (setup, creator, _) = setup_with_contract(0);

    let result = instantiate(&setup, &creator, 1, None, "{}", "contract", &test_coins(10));
    assert!(matches!(result, Err(KeeperError::AccountExists(_))));
    assert_eq!(balance(&setup, &creator.address), 1_000);
    // The failed attempt did not consume an instance id
    let next = instantiate(&setup, &creator, 1, None, "{}", "other", &test_coins(0)).unwrap();
    assert_eq!(next, contract_address(1, 2));
}

#[test]
fn test_instantiate_unknown_code() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();
    let result = instantiate(&setup, &creator, 7, None, "{}", "nothing", &test_coins(0));
    assert!(matches!(result, Err(KeeperError::NotFound(_))));
}

#[test]
fn test_instantiate_label_too_long() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();
    store_code(&setup, &creator);
    let label = "x".repeat(setup.keeper.config().max_label_size + 1);
    let result = setup.keeper.instantiate(
        &setup.ctx,
        1,
        &creator.address,
        None,
        b"{}",
        &label,
        &test_coins(0),
        None,
    );
    assert!(matches!(result, Err(KeeperError::InvalidRequest(_))));
}

#[test]
fn test_failed_instantiation_reports_address() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();
    store_code(&setup, &creator);

    let init = r#"{"fail":{"reason":"bad init"}}"#;
    let err = instantiate(&setup, &creator, 1, None, init, "broken", &test_coins(0)).unwrap_err();
    let KeeperError::InstantiateFailed { reason, contract } = err else {
        panic!("expected an instantiation failure");
    };
    assert!(reason.contains("bad init"));
    assert_eq!(contract, Some(contract_address(1, 1)));
    assert!(setup
        .keeper
        .get_contract_info(&setup.ctx, &contract_address(1, 1))
        .unwrap()
        .is_none());
    assert!(setup.keeper.get_contract_address(&setup.ctx, "broken").unwrap().is_none());
}

#[test]
fn test_unsigned_call_is_rejected() {
    let (setup, creator, contract) = setup_with_contract(0);

    // No transaction in the context
    let err = execute_in(&setup, &setup.ctx, &creator, &contract, "{}", &test_coins(0)).unwrap_err();
    assert!(matches!(err, KeeperError::InstantiateFailed { contract: None, .. }));
    assert!(err.to_string().contains("Unable to decode transaction"));

    // Transaction signed by somebody else
    let other = setup.account(2, 0).unwrap();
    let ctx = setup
        .signed_ctx(&[&other], vec![execute_msg(&other, &contract, "{}", &test_coins(0))])
        .unwrap();
    let err = execute_in(&setup, &ctx, &creator, &contract, "{}", &test_coins(0)).unwrap_err();
    assert!(matches!(err, KeeperError::InstantiateFailed { contract: None, .. }));
    assert!(err.to_string().contains("not found in the tx signer set"));
}

#[test]
fn test_genesis_height_signs_with_account_number_zero() {
    let setup = TestSetup {
        ctx: test_context(Arc::new(MemoryStore::new()), 0),
        ..TestSetup::new()
    };
    setup.account(1, 0).unwrap();
    // Second account, so its real account number is not 0
    let creator = setup.account(2, 1_000).unwrap();
    store_code(&setup, &creator);
    let contract = instantiate(&setup, &creator, 1, None, "{}", "genesis", &test_coins(0)).unwrap();
    execute(&setup, &creator, &contract, "{}", &test_coins(0)).unwrap();

    // Signed with the real account number instead
    let later = test_context(setup.ctx.store().clone(), 1);
    let tx = sign_tx(&later, &setup.ledger, &[&creator], vec![execute_msg(&creator, &contract, "{}", &test_coins(0))])
        .unwrap();
    let ctx = setup.ctx.clone().with_tx_bytes(tx);
    let result = execute_in(&setup, &ctx, &creator, &contract, "{}", &test_coins(0));
    assert!(matches!(result, Err(KeeperError::ExecuteFailed(_))));
}

#[test]
fn test_signer_without_account_is_rejected() {
    let (setup, creator, contract) = setup_with_contract(0);
    let ghost = TestAccount::new(7);
    let ctx = setup
        .signed_ctx(&[&creator], vec![execute_msg(&creator, &contract, "{}", &test_coins(0))])
        .unwrap();

    let err = execute_in(&setup, &ctx, &ghost, &contract, "{}", &test_coins(0)).unwrap_err();
    assert!(matches!(err, KeeperError::InstantiateFailed { contract: None, .. }));
    assert!(err.to_string().contains("Unable to retrieve account by address"));
}

#[test]
fn test_execute_must_match_signed_message() {
    let (setup, creator, contract) = setup_with_contract(0);
    let signed = r#"{"set":{"key":"a","value":"1"}}"#;
    let ctx = setup
        .signed_ctx(&[&creator], vec![execute_msg(&creator, &contract, signed, &test_coins(0))])
        .unwrap();

    let tampered = r#"{"set":{"key":"a","value":"2"}}"#;
    let result = execute_in(&setup, &ctx, &creator, &contract, tampered, &test_coins(0));
    assert!(matches!(result, Err(KeeperError::ExecuteFailed(_))));
    assert!(get_value(&setup, &contract, "a").is_null());
}

#[test]
fn test_forged_callback_signature_is_rejected() {
    let (setup, creator, contract) = setup_with_contract(0);
    let forged = Binary(vec![7; 32]);
    let result = setup.keeper.execute(
        &setup.ctx,
        &contract,
        &creator.address,
        b"{}",
        &test_coins(0),
        Some(&forged),
    );
    assert!(matches!(result, Err(KeeperError::ExecuteFailed(_))));
}

#[test]
fn test_execute_writes_state_and_returns_data() {
    let (setup, creator, contract) = setup_with_contract(0);
    let msg = r#"[{"set":{"key":"count","value":"1"}},{"data":{"value":"done"}},{"log":{"key":"action","value":"bump"}}]"#;

    let data = execute(&setup, &creator, &contract, msg, &test_coins(0)).unwrap();
    assert_eq!(data, Some(Binary(b"done".to_vec())));
    assert_eq!(get_value(&setup, &contract, "count"), json!("1"));

    let events = setup.ctx.events().events();
    let last = events.iter().rev().find(|e| e.ty == CONTRACT_EVENT_TYPE).unwrap();
    assert_eq!(last.attribute("action"), Some("bump"));
}

#[test]
fn test_execute_transfers_sent_funds() {
    let (setup, creator, contract) = setup_with_contract(0);
    execute(&setup, &creator, &contract, "{}", &test_coins(300)).unwrap();
    assert_eq!(balance(&setup, &contract), 300);
    assert_eq!(balance(&setup, &creator.address), 700);

    let result = execute(&setup, &creator, &contract, "{}", &test_coins(5_000));
    assert!(matches!(result, Err(KeeperError::InsufficientFunds(_))));
}

#[test]
fn test_unknown_contract_is_not_found() {
    let setup = setup();
    let caller = setup.account(1, 500).unwrap();
    let nobody = contract_address(9, 9);

    let result = execute(&setup, &caller, &nobody, "{}", &test_coins(100));
    assert!(matches!(result, Err(KeeperError::NotFound(_))));
    assert_eq!(balance(&setup, &caller.address), 500);
    assert_eq!(balance(&setup, &nobody), 0);
    let result = setup.keeper.query_smart(&setup.ctx, &nobody, b"{}", false);
    assert!(matches!(result, Err(KeeperError::NotFound(_))));
}

#[test]
fn test_call_without_gas_is_out_of_gas() {
    let (setup, creator, contract) = setup_with_contract(0);
    let ctx = setup
        .signed_ctx(&[&creator], vec![execute_msg(&creator, &contract, "{}", &test_coins(0))])
        .unwrap()
        .with_gas_meter(GasMeter::new(400));

    // 400 ledger gas buys less sandbox gas than the call's entry cost
    let result = execute_in(&setup, &ctx, &creator, &contract, "{}", &test_coins(0));
    assert!(matches!(result, Err(KeeperError::OutOfGas { limit: 400, .. })));
}

#[test]
fn test_sandbox_gas_is_charged_rounded_up() {
    let (setup, creator, contract) = setup_with_contract(0);
    let msg = r#"{"burn":{"gas":12345}}"#;
    let ctx = setup
        .signed_ctx(&[&creator], vec![execute_msg(&creator, &contract, msg, &test_coins(0))])
        .unwrap()
        .with_gas_meter(GasMeter::new(1_000_000));

    execute_in(&setup, &ctx, &creator, &contract, msg, &test_coins(0)).unwrap();
    // entry 50_000 + one op 5_000 + burn 12_345 sandbox gas
    assert_eq!(ctx.gas_meter().consumed(), 67_345 / 100 + 1);
}

#[test]
fn test_failed_call_is_still_charged() {
    let (setup, creator, contract) = setup_with_contract(0);
    let msg = r#"[{"burn":{"gas":1000}},{"fail":{"reason":"nope"}}]"#;
    let ctx = setup
        .signed_ctx(&[&creator], vec![execute_msg(&creator, &contract, msg, &test_coins(0))])
        .unwrap()
        .with_gas_meter(GasMeter::new(1_000_000));

    let result = execute_in(&setup, &ctx, &creator, &contract, msg, &test_coins(0));
    assert!(matches!(result, Err(KeeperError::ExecuteFailed(_))));
    assert_eq!(ctx.gas_meter().consumed(), 61_000 / 100 + 1);
}

#[test]
fn test_query_gas_limits() {
    let (setup, _, contract) = setup_with_contract(0);
    let heavy = br#"{"burn":{"gas":400000000}}"#;

    // Own meter of smart_query_gas_limit: 3_000_000 ledger gas, 300M sandbox gas
    let caller = setup.ctx.with_gas_meter(GasMeter::new(10_000_000));
    let result = setup.keeper.query_smart(&caller, &contract, heavy, false);
    assert!(matches!(result, Err(KeeperError::OutOfGas { limit: 3_000_000, .. })));
    assert_eq!(caller.gas_meter().consumed(), 0);

    // Caller's meter: capped only by MAX_GAS
    setup.keeper.query_smart(&caller, &contract, heavy, true).unwrap();
    assert_eq!(caller.gas_meter().consumed(), 400_055_000 / 100 + 1);
}

#[test]
fn test_query_cannot_write() {
    let (setup, _, contract) = setup_with_contract(0);
    let result = setup
        .keeper
        .query_smart(&setup.ctx, &contract, br#"{"set":{"key":"a","value":"1"}}"#, false);
    assert!(matches!(result, Err(KeeperError::QueryFailed(_))));
    assert!(get_value(&setup, &contract, "a").is_null());
}

#[test]
fn test_query_raw_returns_sealed_value() {
    let (setup, creator, contract) = setup_with_contract(0);
    execute(&setup, &creator, &contract, r#"{"set":{"key":"count","value":"1"}}"#, &test_coins(0)).unwrap();
    let first = setup.keeper.query_raw(&setup.ctx, &contract, Some(b"count")).unwrap();
    execute(&setup, &creator, &contract, r#"{"set":{"key":"count","value":"2"}}"#, &test_coins(0)).unwrap();

    let models = setup.keeper.query_raw(&setup.ctx, &contract, Some(b"count")).unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].key.as_slice(), b"count");
    assert_ne!(models[0].value.as_slice(), b"2");
    assert_ne!(models[0].value, first[0].value);
    let stored = setup.keeper.get_contract_state(&setup.ctx, &contract).unwrap();
    assert_eq!(models[0].value, stored[0].value);
    assert_eq!(get_value(&setup, &contract, "count"), json!("2"));

    assert!(setup.keeper.query_raw(&setup.ctx, &contract, Some(b"missing")).unwrap().is_empty());
    assert!(setup.keeper.query_raw(&setup.ctx, &contract, None).unwrap().is_empty());
}

#[test]
fn test_contract_state_listing() {
    let (setup, creator, contract) = setup_with_contract(0);
    let msg = r#"[{"set":{"key":"b","value":"2"}},{"set":{"key":"a","value":"1"}}]"#;
    execute(&setup, &creator, &contract, msg, &test_coins(0)).unwrap();

    let state = setup.keeper.get_contract_state(&setup.ctx, &contract).unwrap();
    let keys: Vec<&[u8]> = state.iter().map(|m| m.key.as_slice()).collect();
    assert_eq!(keys, vec![b"a".as_slice(), b"b".as_slice()]);
}

#[test]
fn test_list_contract_info_stops_early() {
    let (setup, creator, first) = setup_with_contract(0);
    let second = instantiate(&setup, &creator, 1, None, "{}", "second", &test_coins(0)).unwrap();

    let mut seen = Vec::new();
    setup
        .keeper
        .list_contract_info(&setup.ctx, |addr, _| {
            seen.push(addr);
            false
        })
        .unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&first) && seen.contains(&second));

    let mut count = 0;
    setup
        .keeper
        .list_contract_info(&setup.ctx, |_, _| {
            count += 1;
            true
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_migrate_requires_admin() {
    let setup = setup();
    let creator = setup.account(1, 0).unwrap();
    store_code(&setup, &creator);
    let contract = instantiate(&setup, &creator, 1, None, "{}", "no-admin", &test_coins(0)).unwrap();

    let err = migrate(&setup, &creator, &contract, 1, "{}").unwrap_err();
    assert!(matches!(&err, KeeperError::Unauthorized(reason) if reason.contains("migration not supported")));

    let err = migrate(&setup, &creator, &contract_address(5, 5), 1, "{}").unwrap_err();
    assert!(matches!(&err, KeeperError::InvalidRequest(reason) if reason == "unknown contract"));
}

#[test]
fn test_migrate_keeps_state_and_switches_code() {
    let (setup, creator, contract) = setup_with_contract(0);
    execute(&setup, &creator, &contract, r#"{"set":{"key":"count","value":"7"}}"#, &test_coins(0)).unwrap();
    let v2 = setup
        .keeper
        .create(&setup.ctx, &creator.address, TEST_WASM_V2, "", "")
        .unwrap();

    let result = migrate(&setup, &creator, &contract, 99, "{}");
    assert!(matches!(result, Err(KeeperError::InvalidRequest(reason)) if reason == "unknown code"));

    let data = migrate(&setup, &creator, &contract, v2, r#"{"data":{"value":"migrated"}}"#).unwrap();
    assert_eq!(data, Some(Binary(b"migrated".to_vec())));

    let info = setup.keeper.get_contract_info(&setup.ctx, &contract).unwrap().unwrap();
    assert_eq!(info.code_id, v2);
    let v2_info = setup.keeper.get_code_info(&setup.ctx, v2).unwrap().unwrap();
    assert_eq!(
        setup.keeper.get_contract_hash(&setup.ctx, &contract).unwrap(),
        Some(v2_info.code_hash_hex())
    );
    assert_eq!(get_value(&setup, &contract, "count"), json!("7"));
}

#[test]
fn test_failed_migration_keeps_code() {
    let (setup, creator, contract) = setup_with_contract(0);
    let v2 = setup
        .keeper
        .create(&setup.ctx, &creator.address, TEST_WASM_V2, "", "")
        .unwrap();

    let result = migrate(&setup, &creator, &contract, v2, r#"{"fail":{"reason":"no"}}"#);
    assert!(matches!(result, Err(KeeperError::MigrationFailed(_))));
    let info = setup.keeper.get_contract_info(&setup.ctx, &contract).unwrap().unwrap();
    assert_eq!(info.code_id, 1);
}

#[test]
fn test_admin_transfer() {
    let (setup, creator, contract) = setup_with_contract(0);
    let new_admin = setup.account(2, 0).unwrap();

    let stranger = TestAccount::new(3);
    let result = setup.keeper.update_contract_admin(
        &setup.ctx,
        &contract,
        &stranger.address,
        Some(stranger.address),
    );
    assert!(matches!(result, Err(KeeperError::Unauthorized(_))));

    setup
        .keeper
        .update_contract_admin(&setup.ctx, &contract, &creator.address, Some(new_admin.address))
        .unwrap();
    let result = migrate(&setup, &creator, &contract, 1, "{}");
    assert!(matches!(result, Err(KeeperError::Unauthorized(reason)) if reason == "no permission"));
    migrate(&setup, &new_admin, &contract, 1, "{}").unwrap();

    setup
        .keeper
        .update_contract_admin(&setup.ctx, &contract, &new_admin.address, None)
        .unwrap();
    assert_eq!(
        setup.keeper.get_contract_info(&setup.ctx, &contract).unwrap().unwrap().admin,
        None
    );
    let result = migrate(&setup, &new_admin, &contract, 1, "{}");
    assert!(matches!(result, Err(KeeperError::Unauthorized(_))));
}
