//! Test helpers: store-backed ledger keepers, deterministic accounts and
//! transaction signing.
//!
//! Everything the test keepers persist lives in the context's store, so it
//! commits and rolls back together with the keeper's own writes.

use ed25519_dalek::{Signer, SigningKey};
use std::sync::Arc;
use veil_enclave::{MockEnclave, MockEnclaveBuilder};
use veil_storage::{codec, KvStore, MemoryStore};
use veil_types::{
    AccAddress, Binary, Coin, Coins, Delegation, StdFee, StdSignDoc, StdSignature, StdTx, TxMsg,
    Validator,
};

use crate::context::{BlockHeader, Context};
use crate::ledger::{
    AccountKeeper, BankKeeper, BaseAccount, DistributionKeeper, LedgerKeepers, MintKeeper,
    StakingKeeper,
};
use crate::{ComputeConfig, Keeper, KeeperError, KeeperResult};

pub const TEST_CHAIN_ID: &str = "veil-test";
pub const TEST_DENOM: &str = "uveil";

/// Minimal bytecode the mock enclave accepts
pub const TEST_WASM: &[u8] = b"\0asm\x01\x00\x00\x00veil-test-contract";

/// Validators known to [`TestStakingKeeper`]
pub const TEST_VALIDATORS: [&str; 2] = ["veilvaloper1alpha", "veilvaloper1beta"];

/// Account holding delegated funds
pub const BONDED_POOL: AccAddress = AccAddress::new([0xb0; 20]);

const ACCOUNT_PREFIX: &[u8] = b"acc/";
const ACCOUNT_NUMBER_KEY: &[u8] = b"acc-number/";
const BALANCE_PREFIX: &[u8] = b"bank/";
const DELEGATION_PREFIX: &[u8] = b"stake/";

fn key(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

#[derive(Debug, Default)]
pub struct TestAccountKeeper;

impl AccountKeeper for TestAccountKeeper {
    fn get_account(&self, ctx: &Context, addr: &AccAddress) -> KeeperResult<Option<BaseAccount>> {
        Ok(codec::get_record(ctx.store().as_ref(), &key(ACCOUNT_PREFIX, &[addr.as_bytes()]))?)
    }

    fn new_account_with_address(&self, ctx: &Context, addr: &AccAddress) -> KeeperResult<BaseAccount> {
        let store = ctx.store();
        let number = match store.get(ACCOUNT_NUMBER_KEY)? {
            Some(bytes) => codec::decode_u64(&bytes)?,
            None => 0,
        };
        store.set(ACCOUNT_NUMBER_KEY, &(number + 1).to_be_bytes())?;
        Ok(BaseAccount {
            address: *addr,
            pub_key: None,
            account_number: number,
            sequence: 0,
        })
    }

    fn set_account(&self, ctx: &Context, account: BaseAccount) -> KeeperResult<()> {
        let key = key(ACCOUNT_PREFIX, &[account.address.as_bytes()]);
        Ok(codec::put_record(ctx.store().as_ref(), &key, &account)?)
    }
}

pub struct TestBankKeeper {
    accounts: Arc<TestAccountKeeper>,
}

impl TestBankKeeper {
    pub fn new(accounts: Arc<TestAccountKeeper>) -> Self {
        Self { accounts }
    }

    pub fn set_balance(&self, ctx: &Context, addr: &AccAddress, coins: &Coins) -> KeeperResult<()> {
        let key = key(BALANCE_PREFIX, &[addr.as_bytes()]);
        Ok(codec::put_record(ctx.store().as_ref(), &key, coins)?)
    }

    fn ensure_account(&self, ctx: &Context, addr: &AccAddress) -> KeeperResult<()> {
        if self.accounts.get_account(ctx, addr)?.is_none() {
            let account = self.accounts.new_account_with_address(ctx, addr)?;
            self.accounts.set_account(ctx, account)?;
        }
        Ok(())
    }
}

impl BankKeeper for TestBankKeeper {
    fn send_coins(&self, ctx: &Context, from: &AccAddress, to: &AccAddress, amount: &Coins) -> KeeperResult<()> {
        let remaining = self
            .all_balances(ctx, from)?
            .checked_sub(amount)
            .ok_or_else(|| KeeperError::InsufficientFunds(format!("{} cannot pay {}", from, amount)))?;
        self.set_balance(ctx, from, &remaining)?;

        let mut received = self.all_balances(ctx, to)?;
        for coin in amount.iter() {
            received.add(coin);
        }
        self.set_balance(ctx, to, &received)?;
        self.ensure_account(ctx, to)
    }

    fn balance(&self, ctx: &Context, addr: &AccAddress, denom: &str) -> KeeperResult<Coin> {
        Ok(Coin::new(self.all_balances(ctx, addr)?.amount_of(denom), denom))
    }

    fn all_balances(&self, ctx: &Context, addr: &AccAddress) -> KeeperResult<Coins> {
        let key = key(BALANCE_PREFIX, &[addr.as_bytes()]);
        Ok(codec::get_record(ctx.store().as_ref(), &key)?.unwrap_or_default())
    }
}

/// Staking over [`TEST_VALIDATORS`]. Delegated funds move to [`BONDED_POOL`].
pub struct TestStakingKeeper {
    bank: Arc<TestBankKeeper>,
}

impl TestStakingKeeper {
    pub fn new(bank: Arc<TestBankKeeper>) -> Self {
        Self { bank }
    }

    fn check_validator(validator: &str) -> KeeperResult<()> {
        if TEST_VALIDATORS.contains(&validator) {
            Ok(())
        } else {
            Err(KeeperError::InvalidRequest(format!("unknown validator {}", validator)))
        }
    }

    fn delegation_key(delegator: &AccAddress, validator: &str) -> Vec<u8> {
        key(DELEGATION_PREFIX, &[delegator.as_bytes(), validator.as_bytes()])
    }

    fn bonded(&self, ctx: &Context, delegator: &AccAddress, validator: &str) -> KeeperResult<u128> {
        let record: Option<Coin> =
            codec::get_record(ctx.store().as_ref(), &Self::delegation_key(delegator, validator))?;
        Ok(record.map(|c| c.amount).unwrap_or(0))
    }

    fn set_bonded(&self, ctx: &Context, delegator: &AccAddress, validator: &str, amount: u128) -> KeeperResult<()> {
        let key = Self::delegation_key(delegator, validator);
        if amount == 0 {
            ctx.store().delete(&key)?;
        } else {
            codec::put_record(ctx.store().as_ref(), &key, &Coin::new(amount, TEST_DENOM))?;
        }
        Ok(())
    }

    fn unbond(&self, ctx: &Context, delegator: &AccAddress, validator: &str, amount: &Coin) -> KeeperResult<()> {
        Self::check_validator(validator)?;
        let bonded = self.bonded(ctx, delegator, validator)?;
        let rest = bonded.checked_sub(amount.amount).ok_or_else(|| {
            KeeperError::InvalidRequest(format!("{} has only {} bonded to {}", delegator, bonded, validator))
        })?;
        self.set_bonded(ctx, delegator, validator, rest)
    }
}

impl StakingKeeper for TestStakingKeeper {
    fn bonded_denom(&self, _ctx: &Context) -> KeeperResult<String> {
        Ok(TEST_DENOM.to_string())
    }

    fn validators(&self, _ctx: &Context) -> KeeperResult<Vec<Validator>> {
        Ok(TEST_VALIDATORS
            .iter()
            .map(|v| Validator {
                address: v.to_string(),
                commission: "0.05".to_string(),
            })
            .collect())
    }

    fn delegation(&self, ctx: &Context, delegator: &AccAddress, validator: &str) -> KeeperResult<Option<Delegation>> {
        let bonded = self.bonded(ctx, delegator, validator)?;
        Ok((bonded > 0).then(|| Delegation {
            delegator: *delegator,
            validator: validator.to_string(),
            amount: Coin::new(bonded, TEST_DENOM),
        }))
    }

    fn delegate(&self, ctx: &Context, delegator: &AccAddress, validator: &str, amount: &Coin) -> KeeperResult<()> {
        Self::check_validator(validator)?;
        if amount.denom != TEST_DENOM {
            return Err(KeeperError::InvalidRequest(format!("cannot bond {}", amount.denom)));
        }
        self.bank
            .send_coins(ctx, delegator, &BONDED_POOL, &Coins::from_coins(vec![amount.clone()]))?;
        let bonded = self.bonded(ctx, delegator, validator)?;
        self.set_bonded(ctx, delegator, validator, bonded + amount.amount)
    }

    fn undelegate(&self, ctx: &Context, delegator: &AccAddress, validator: &str, amount: &Coin) -> KeeperResult<()> {
        self.unbond(ctx, delegator, validator, amount)?;
        self.bank
            .send_coins(ctx, &BONDED_POOL, delegator, &Coins::from_coins(vec![amount.clone()]))
    }

    fn redelegate(
        &self,
        ctx: &Context,
        delegator: &AccAddress,
        src_validator: &str,
        dst_validator: &str,
        amount: &Coin,
    ) -> KeeperResult<()> {
        Self::check_validator(dst_validator)?;
        self.unbond(ctx, delegator, src_validator, amount)?;
        let bonded = self.bonded(ctx, delegator, dst_validator)?;
        self.set_bonded(ctx, delegator, dst_validator, bonded + amount.amount)
    }

    fn withdraw_rewards(
        &self,
        _ctx: &Context,
        _delegator: &AccAddress,
        validator: &str,
        _recipient: &AccAddress,
    ) -> KeeperResult<Coins> {
        Self::check_validator(validator)?;
        Ok(Coins::new())
    }
}

pub struct TestMintKeeper;

impl MintKeeper for TestMintKeeper {
    fn inflation(&self, _ctx: &Context) -> KeeperResult<String> {
        Ok("0.130000000000000000".to_string())
    }

    fn annual_provisions(&self, _ctx: &Context) -> KeeperResult<String> {
        Ok("1000000.000000000000000000".to_string())
    }
}

pub struct TestDistributionKeeper;

impl DistributionKeeper for TestDistributionKeeper {
    fn rewards(&self, _ctx: &Context, _delegator: &AccAddress) -> KeeperResult<Coins> {
        Ok(Coins::new())
    }
}

/// Concrete handles on the test ledger, next to the trait objects the
/// keeper receives
pub struct TestLedger {
    pub accounts: Arc<TestAccountKeeper>,
    pub bank: Arc<TestBankKeeper>,
    pub staking: Arc<TestStakingKeeper>,
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLedger {
    pub fn new() -> Self {
        let accounts = Arc::new(TestAccountKeeper);
        let bank = Arc::new(TestBankKeeper::new(accounts.clone()));
        let staking = Arc::new(TestStakingKeeper::new(bank.clone()));
        Self {
            accounts,
            bank,
            staking,
        }
    }

    pub fn keepers(&self) -> LedgerKeepers {
        LedgerKeepers {
            accounts: self.accounts.clone(),
            bank: self.bank.clone(),
            staking: self.staking.clone(),
            mint: Arc::new(TestMintKeeper),
            distribution: Arc::new(TestDistributionKeeper),
        }
    }
}

/// Deterministic ed25519 account
pub struct TestAccount {
    signing_key: SigningKey,
    pub address: AccAddress,
}

impl TestAccount {
    pub fn new(seed: u8) -> Self {
        let signing_key = SigningKey::from_bytes(&[seed; 32]);
        let address = AccAddress::from_pubkey(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    pub fn pub_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    /// Register the account with its public key and `funds`
    pub fn register(&self, ctx: &Context, ledger: &TestLedger, funds: &Coins) -> KeeperResult<()> {
        let mut account = match ledger.accounts.get_account(ctx, &self.address)? {
            Some(account) => account,
            None => ledger.accounts.new_account_with_address(ctx, &self.address)?,
        };
        account.pub_key = Some(Binary(self.pub_key()));
        ledger.accounts.set_account(ctx, account)?;
        ledger.bank.set_balance(ctx, &self.address, funds)
    }
}

/// Sign `msgs` the way a wallet would and advance each signer's sequence
/// the way the ante handler would. Returns the encoded transaction.
pub fn sign_tx(ctx: &Context, ledger: &TestLedger, signers: &[&TestAccount], msgs: Vec<TxMsg>) -> KeeperResult<Vec<u8>> {
    let mut tx = StdTx::new(msgs, StdFee::default(), "");
    for signer in signers {
        let mut account = ledger
            .accounts
            .get_account(ctx, &signer.address)?
            .ok_or_else(|| KeeperError::NotFound(format!("account {}", signer.address)))?;
        let account_number = if ctx.block_height() == 0 {
            0
        } else {
            account.account_number
        };
        let doc = StdSignDoc::new(ctx.chain_id(), account_number, account.sequence, &tx);
        let bytes = doc.bytes().map_err(|e| KeeperError::Codec(e.to_string()))?;
        let signature = signer.signing_key.sign(&bytes);
        tx.signatures.push(StdSignature {
            pub_key: Binary(signer.pub_key()),
            signature: Binary(signature.to_bytes().to_vec()),
        });
        account.sequence += 1;
        ledger.accounts.set_account(ctx, account)?;
    }
    tx.to_bytes().map_err(|e| KeeperError::Codec(e.to_string()))
}

pub fn test_coins(amount: u128) -> Coins {
    Coins::from_coins(vec![Coin::new(amount, TEST_DENOM)])
}

pub fn test_context(store: Arc<dyn KvStore>, height: u64) -> Context {
    Context::new(store, BlockHeader::new(TEST_CHAIN_ID, height, 1_700_000_000 + height * 5))
}

pub fn test_enclave() -> Arc<MockEnclave> {
    Arc::new(MockEnclaveBuilder::new().enclave_id("test-enclave").build())
}

/// Keeper over a fresh memory store at block height 1
pub struct TestSetup {
    pub keeper: Keeper,
    pub ledger: TestLedger,
    pub enclave: Arc<MockEnclave>,
    pub ctx: Context,
}

impl TestSetup {
    pub fn new() -> Self {
        Self::with_config(ComputeConfig::default())
    }

    pub fn with_config(config: ComputeConfig) -> Self {
        let ledger = TestLedger::new();
        let enclave = test_enclave();
        let keeper = Keeper::new(enclave.clone(), ledger.keepers(), config);
        let ctx = test_context(Arc::new(MemoryStore::new()), 1);
        Self {
            keeper,
            ledger,
            enclave,
            ctx,
        }
    }

    /// Create and fund a signing account
    pub fn account(&self, seed: u8, funds: u128) -> KeeperResult<TestAccount> {
        let account = TestAccount::new(seed);
        account.register(&self.ctx, &self.ledger, &test_coins(funds))?;
        Ok(account)
    }

    /// Context carrying `msgs` signed by `signers`
    pub fn signed_ctx(&self, signers: &[&TestAccount], msgs: Vec<TxMsg>) -> KeeperResult<Context> {
        let tx = sign_tx(&self.ctx, &self.ledger, signers, msgs)?;
        Ok(self.ctx.clone().with_tx_bytes(tx))
    }
}

impl Default for TestSetup {
    fn default() -> Self {
        Self::new()
    }
}
