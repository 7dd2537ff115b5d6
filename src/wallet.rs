//! Wallet boundary. Signing and key storage live in the external wallet; this
//! module only describes the transactions handed to it.

use anyhow::Result;
use async_trait::async_trait;
use near_gas::NearGas;
use near_token::NearToken;
use serde_json::{json, Value};

/// Attached gas for every social `set` call.
pub fn default_gas() -> NearGas {
    NearGas::from_tgas(30)
}

/// Preset tips offered on the confirmation step, in milliNEAR.
pub const DEPOSIT_PRESETS_MILLINEAR: [u128; 4] = [0, 10, 100, 1000];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deposit(NearToken);

impl Default for Deposit {
    fn default() -> Self {
        Deposit::zero()
    }
}

impl Deposit {
    pub fn zero() -> Self {
        Deposit(NearToken::from_yoctonear(0))
    }

    pub fn presets() -> Vec<Deposit> {
        DEPOSIT_PRESETS_MILLINEAR
            .iter()
            .map(|m| Deposit(NearToken::from_millinear(*m)))
            .collect()
    }

    pub fn as_yoctonear(&self) -> u128 {
        self.0.as_yoctonear()
    }

    pub fn token(&self) -> NearToken {
        self.0
    }

    /// Display form of the amount, e.g. for confirmation prompts.
    pub fn label(&self) -> String {
        format!("{}", self.0)
    }
}

impl From<NearToken> for Deposit {
    fn from(token: NearToken) -> Self {
        Deposit(token)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionCall {
    pub method_name: String,
    pub args: Value,
    pub gas: NearGas,
    pub deposit: Deposit,
}

impl FunctionCall {
    /// Wallet-selector action shape.
    pub fn to_json(&self) -> Value {
        json!({
            "type": "FunctionCall",
            "params": {
                "methodName": self.method_name,
                "args": self.args,
                "gas": self.gas.as_gas().to_string(),
                "deposit": self.deposit.as_yoctonear().to_string(),
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletAction {
    FunctionCall(FunctionCall),
}

impl WalletAction {
    pub fn to_json(&self) -> Value {
        match self {
            WalletAction::FunctionCall(fc) => fc.to_json(),
        }
    }
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Account the wallet signs for, restored from the wallet's own storage.
    fn account_id(&self) -> Option<String>;

    /// Sign and submit. Rejection inside the wallet surfaces as `Err`.
    async fn sign_and_send_transaction(
        &self,
        receiver_id: &str,
        actions: Vec<WalletAction>,
    ) -> Result<Value>;
}
