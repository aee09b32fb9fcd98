//! Ledger messages handled by the compute keeper.

use serde::{Deserialize, Serialize};

use crate::{AccAddress, Binary, Coins, TypesError, TypesResult};

/// Upper bound on uploaded bytecode, before and after decompression
pub const MAX_WASM_SIZE: usize = 500 * 1024;

/// Upper bound on contract labels
pub const MAX_LABEL_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgStoreCode {
    pub sender: AccAddress,
    /// Raw or gzip-compressed bytecode
    pub wasm_byte_code: Binary,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub builder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInstantiateContract {
    pub sender: AccAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<AccAddress>,
    pub code_id: u64,
    pub label: String,
    pub init_msg: Binary,
    #[serde(default)]
    pub init_funds: Coins,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_sig: Option<Binary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExecuteContract {
    pub sender: AccAddress,
    pub contract: AccAddress,
    pub msg: Binary,
    #[serde(default)]
    pub sent_funds: Coins,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_sig: Option<Binary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMigrateContract {
    pub sender: AccAddress,
    pub contract: AccAddress,
    pub code_id: u64,
    pub msg: Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateAdmin {
    pub sender: AccAddress,
    pub new_admin: AccAddress,
    pub contract: AccAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgClearAdmin {
    pub sender: AccAddress,
    pub contract: AccAddress,
}

/// Any message the compute keeper accepts in a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TxMsg {
    StoreCode(MsgStoreCode),
    InstantiateContract(MsgInstantiateContract),
    ExecuteContract(MsgExecuteContract),
    MigrateContract(MsgMigrateContract),
    UpdateAdmin(MsgUpdateAdmin),
    ClearAdmin(MsgClearAdmin),
}

impl TxMsg {
    /// Account that must sign this message
    pub fn signer(&self) -> AccAddress {
        match self {
            TxMsg::StoreCode(m) => m.sender,
            TxMsg::InstantiateContract(m) => m.sender,
            TxMsg::ExecuteContract(m) => m.sender,
            TxMsg::MigrateContract(m) => m.sender,
            TxMsg::UpdateAdmin(m) => m.sender,
            TxMsg::ClearAdmin(m) => m.sender,
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            TxMsg::StoreCode(_) => "store_code",
            TxMsg::InstantiateContract(_) => "instantiate",
            TxMsg::ExecuteContract(_) => "execute",
            TxMsg::MigrateContract(_) => "migrate",
            TxMsg::UpdateAdmin(_) => "update_contract_admin",
            TxMsg::ClearAdmin(_) => "clear_contract_admin",
        }
    }

    /// Stateless checks run before the message reaches the keeper
    pub fn validate_basic(&self) -> TypesResult<()> {
        check_sender(&self.signer())?;
        match self {
            TxMsg::StoreCode(m) => {
                if m.wasm_byte_code.is_empty() {
                    return invalid("empty wasm code");
                }
                if m.wasm_byte_code.len() > MAX_WASM_SIZE {
                    return invalid(format!(
                        "wasm code exceeds {} bytes: {}",
                        MAX_WASM_SIZE,
                        m.wasm_byte_code.len()
                    ));
                }
                Ok(())
            }
            TxMsg::InstantiateContract(m) => {
                check_code_id(m.code_id)?;
                validate_label(&m.label)?;
                m.init_funds.validate()
            }
            TxMsg::ExecuteContract(m) => {
                check_contract(&m.contract)?;
                m.sent_funds.validate()
            }
            TxMsg::MigrateContract(m) => {
                check_code_id(m.code_id)?;
                check_contract(&m.contract)
            }
            TxMsg::UpdateAdmin(m) => {
                check_contract(&m.contract)?;
                if m.new_admin.is_empty() {
                    return invalid("new admin is empty");
                }
                if m.new_admin == m.sender {
                    return invalid("new admin is the same as the old");
                }
                Ok(())
            }
            TxMsg::ClearAdmin(m) => check_contract(&m.contract),
        }
    }
}

/// Labels must be non-blank and at most [`MAX_LABEL_SIZE`] bytes
pub fn validate_label(label: &str) -> TypesResult<()> {
    if label.trim().is_empty() {
        return invalid("label is required");
    }
    if label.len() > MAX_LABEL_SIZE {
        return invalid(format!("label exceeds {} bytes", MAX_LABEL_SIZE));
    }
    Ok(())
}

fn check_sender(sender: &AccAddress) -> TypesResult<()> {
    if sender.is_empty() {
        return invalid("missing sender");
    }
    Ok(())
}

fn check_contract(contract: &AccAddress) -> TypesResult<()> {
    if contract.is_empty() {
        return invalid("missing contract address");
    }
    Ok(())
}

fn check_code_id(code_id: u64) -> TypesResult<()> {
    if code_id == 0 {
        return invalid("code id is required");
    }
    Ok(())
}

fn invalid<T>(reason: impl Into<String>) -> TypesResult<T> {
    Err(TypesError::InvalidMessage(reason.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coin;

    fn sender() -> AccAddress {
        AccAddress::new([1; 20])
    }

    fn instantiate(label: &str, code_id: u64) -> TxMsg {
        TxMsg::InstantiateContract(MsgInstantiateContract {
            sender: sender(),
            admin: None,
            code_id,
            label: label.to_string(),
            init_msg: Binary(b"{}".to_vec()),
            init_funds: Coins::new(),
            callback_sig: None,
        })
    }

    #[test]
    fn test_instantiate_validation() {
        assert!(instantiate("counter", 1).validate_basic().is_ok());
        assert!(instantiate("counter", 0).validate_basic().is_err());
        assert!(instantiate("   ", 1).validate_basic().is_err());
        assert!(instantiate(&"x".repeat(MAX_LABEL_SIZE + 1), 1)
            .validate_basic()
            .is_err());
    }

    #[test]
    fn test_store_code_validation() {
        let empty = TxMsg::StoreCode(MsgStoreCode {
            sender: sender(),
            wasm_byte_code: Binary::default(),
            source: String::new(),
            builder: String::new(),
        });
        assert!(empty.validate_basic().is_err());

        let anon = TxMsg::StoreCode(MsgStoreCode {
            sender: AccAddress::default(),
            wasm_byte_code: Binary(b"\0asm".to_vec()),
            source: String::new(),
            builder: String::new(),
        });
        assert!(anon.validate_basic().is_err());
    }

    #[test]
    fn test_update_admin_rejects_self() {
        let msg = TxMsg::UpdateAdmin(MsgUpdateAdmin {
            sender: sender(),
            new_admin: sender(),
            contract: AccAddress::new([2; 20]),
        });
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_execute_rejects_blank_denom() {
        let msg = TxMsg::ExecuteContract(MsgExecuteContract {
            sender: sender(),
            contract: AccAddress::new([2; 20]),
            msg: Binary(b"{}".to_vec()),
            sent_funds: Coins::from_coins(vec![Coin::new(1, " ")]),
            callback_sig: None,
        });
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_tagged_json() {
        let json = serde_json::to_value(instantiate("a", 1)).unwrap();
        assert_eq!(json["type"], "instantiate_contract");
        assert_eq!(json["value"]["code_id"], 1);
    }
}
