//! Shared fixtures for the keeper integration tests

#![allow(dead_code)]

use serde_json::Value;
use veil_compute::test_utils::{test_coins, TestAccount, TestSetup, TEST_WASM};
use veil_compute::{BankKeeper, Context, KeeperResult};
use veil_types::{
    AccAddress, Binary, Coins, MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract,
    TxMsg,
};

/// Second code, distinct from [`TEST_WASM`]
pub const TEST_WASM_V2: &[u8] = b"\0asm\x01\x00\x00\x00veil-test-contract-v2";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn setup() -> TestSetup {
    init_tracing();
    TestSetup::new()
}

pub fn store_code(setup: &TestSetup, creator: &TestAccount) -> u64 {
    setup
        .keeper
        .create(&setup.ctx, &creator.address, TEST_WASM, "", "")
        .unwrap()
}

pub fn instantiate_msg(
    creator: &TestAccount,
    code_id: u64,
    admin: Option<AccAddress>,
    init_msg: &str,
    label: &str,
    deposit: &Coins,
) -> TxMsg {
    TxMsg::InstantiateContract(MsgInstantiateContract {
        sender: creator.address,
        admin,
        code_id,
        label: label.to_string(),
        init_msg: Binary(init_msg.as_bytes().to_vec()),
        init_funds: deposit.clone(),
        callback_sig: None,
    })
}

pub fn execute_msg(sender: &TestAccount, contract: &AccAddress, msg: &str, funds: &Coins) -> TxMsg {
    TxMsg::ExecuteContract(MsgExecuteContract {
        sender: sender.address,
        contract: *contract,
        msg: Binary(msg.as_bytes().to_vec()),
        sent_funds: funds.clone(),
        callback_sig: None,
    })
}

pub fn migrate_msg(sender: &TestAccount, contract: &AccAddress, code_id: u64, msg: &str) -> TxMsg {
    TxMsg::MigrateContract(MsgMigrateContract {
        sender: sender.address,
        contract: *contract,
        code_id,
        msg: Binary(msg.as_bytes().to_vec()),
    })
}

/// Sign and run an instantiation the way a transaction would
#[allow(clippy::too_many_arguments)]
pub fn instantiate(
    setup: &TestSetup,
    creator: &TestAccount,
    code_id: u64,
    admin: Option<AccAddress>,
    init_msg: &str,
    label: &str,
    deposit: &Coins,
) -> KeeperResult<AccAddress> {
    let ctx = setup.signed_ctx(
        &[creator],
        vec![instantiate_msg(creator, code_id, admin, init_msg, label, deposit)],
    )?;
    setup.keeper.instantiate(
        &ctx,
        code_id,
        &creator.address,
        admin,
        init_msg.as_bytes(),
        label,
        deposit,
        None,
    )
}

pub fn execute(
    setup: &TestSetup,
    sender: &TestAccount,
    contract: &AccAddress,
    msg: &str,
    funds: &Coins,
) -> KeeperResult<Option<Binary>> {
    let ctx = setup.signed_ctx(&[sender], vec![execute_msg(sender, contract, msg, funds)])?;
    execute_in(setup, &ctx, sender, contract, msg, funds)
}

pub fn execute_in(
    setup: &TestSetup,
    ctx: &Context,
    sender: &TestAccount,
    contract: &AccAddress,
    msg: &str,
    funds: &Coins,
) -> KeeperResult<Option<Binary>> {
    setup
        .keeper
        .execute(ctx, contract, &sender.address, msg.as_bytes(), funds, None)
}

pub fn migrate(
    setup: &TestSetup,
    sender: &TestAccount,
    contract: &AccAddress,
    code_id: u64,
    msg: &str,
) -> KeeperResult<Option<Binary>> {
    let ctx = setup.signed_ctx(&[sender], vec![migrate_msg(sender, contract, code_id, msg)])?;
    setup
        .keeper
        .migrate(&ctx, contract, &sender.address, code_id, msg.as_bytes())
}

/// Value stored under `key` in `contract`, read through a smart query
pub fn get_value(setup: &TestSetup, contract: &AccAddress, key: &str) -> Value {
    let query = serde_json::json!({ "get": { "key": key } }).to_string();
    let reply = setup
        .keeper
        .query_smart(&setup.ctx, contract, query.as_bytes(), false)
        .unwrap();
    let reply: Value = serde_json::from_slice(&reply).unwrap();
    reply["value"].clone()
}

pub fn balance(setup: &TestSetup, addr: &AccAddress) -> u128 {
    setup
        .ledger
        .bank
        .balance(&setup.ctx, addr, veil_compute::test_utils::TEST_DENOM)
        .unwrap()
        .amount
}

/// Creator with funds, one stored code and one instantiated contract
pub fn setup_with_contract(deposit: u128) -> (TestSetup, TestAccount, AccAddress) {
    let setup = setup();
    let creator = setup.account(1, 1_000).unwrap();
    let code_id = store_code(&setup, &creator);
    let contract = instantiate(
        &setup,
        &creator,
        code_id,
        Some(creator.address),
        "{}",
        "contract",
        &test_coins(deposit),
    )
    .unwrap();
    (setup, creator, contract)
}
