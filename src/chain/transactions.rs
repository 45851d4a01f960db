// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Programmable transaction descriptions for the subscription package.
//!
//! Transactions are described here and handed to an external builder
//! (kind-only bytes for key-server authorization) or executor (signed and
//! submitted by the wallet). Nothing in this module signs or serializes
//! transactions to BCS.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::ChainError;
use super::types::CLOCK_OBJECT_ID;

/// Gas budget attached to subscription purchases.
pub const SUBSCRIBE_GAS_BUDGET: u64 = 10_000_000;

/// Move module holding the subscription entry points.
const SUBSCRIPTION_MODULE: &str = "subscription";

/// A single argument to a Move call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Argument {
    /// Pure `vector<u8>`, hex-encoded.
    PureBytes(String),
    /// Pure `address`.
    Address(String),
    /// Object input, resolved by the builder.
    Object(String),
    /// Coin split from gas / owned coins with the given balance (MIST).
    CoinWithBalance(u64),
    /// Result of an earlier command in the same transaction.
    Result(u16),
}

impl Argument {
    pub fn pure_bytes(bytes: &[u8]) -> Self {
        Self::PureBytes(hex::encode(bytes))
    }

    pub fn object(id: impl Into<String>) -> Self {
        Self::Object(id.into())
    }
}

/// `package::module::function(arguments...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    pub target: String,
    pub arguments: Vec<Argument>,
}

/// An ordered list of Move calls plus optional sender and gas budget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_budget: Option<u64>,
    pub commands: Vec<MoveCall>,
}

impl ProgrammableTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.sender = Some(sender.into());
    }

    pub fn set_gas_budget(&mut self, budget: u64) {
        self.gas_budget = Some(budget);
    }

    /// Append a Move call and return a handle to its result.
    pub fn move_call(&mut self, target: impl Into<String>, arguments: Vec<Argument>) -> Argument {
        let index = self.commands.len() as u16;
        self.commands.push(MoveCall {
            target: target.into(),
            arguments,
        });
        Argument::Result(index)
    }
}

/// Fully qualified target in the subscription module.
pub fn subscription_target(package_id: &str, function: &str) -> String {
    format!("{package_id}::{SUBSCRIPTION_MODULE}::{function}")
}

/// Appends the authorization call for one encrypted id to a transaction.
///
/// Implemented for plain closures so callers can supply ad-hoc policies.
pub trait ApprovalConstructor: Send + Sync {
    fn add_approval(&self, tx: &mut ProgrammableTransaction, id: &[u8]);
}

impl<F> ApprovalConstructor for F
where
    F: Fn(&mut ProgrammableTransaction, &[u8]) + Send + Sync,
{
    fn add_approval(&self, tx: &mut ProgrammableTransaction, id: &[u8]) {
        self(tx, id)
    }
}

/// `seal_approve(id, subscription, service, clock)` for a held subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionApproval {
    pub package_id: String,
    pub service_id: String,
    pub subscription_id: String,
}

impl ApprovalConstructor for SubscriptionApproval {
    fn add_approval(&self, tx: &mut ProgrammableTransaction, id: &[u8]) {
        tx.move_call(
            subscription_target(&self.package_id, "seal_approve"),
            vec![
                Argument::pure_bytes(id),
                Argument::object(&self.subscription_id),
                Argument::object(&self.service_id),
                Argument::object(CLOCK_OBJECT_ID),
            ],
        );
    }
}

/// Purchase a subscription and transfer it to `sender`.
pub fn subscribe_transaction(
    package_id: &str,
    service_id: &str,
    fee: u64,
    sender: &str,
) -> ProgrammableTransaction {
    let mut tx = ProgrammableTransaction::new();
    tx.set_gas_budget(SUBSCRIBE_GAS_BUDGET);
    tx.set_sender(sender);

    let subscription = tx.move_call(
        subscription_target(package_id, "subscribe"),
        vec![
            Argument::CoinWithBalance(fee),
            Argument::object(service_id),
            Argument::object(CLOCK_OBJECT_ID),
        ],
    );
    tx.move_call(
        subscription_target(package_id, "transfer"),
        vec![subscription, Argument::Address(sender.to_string())],
    );
    tx
}

/// Outcome of an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub digest: String,
}

/// Builds kind-only transaction bytes (no gas, no sender) for authorization.
#[async_trait]
pub trait TransactionKindBuilder: Send + Sync {
    async fn build_kind(&self, tx: &ProgrammableTransaction) -> Result<Vec<u8>, ChainError>;
}

/// Signs and submits a transaction on behalf of the connected wallet.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    async fn execute(&self, tx: &ProgrammableTransaction) -> Result<ExecutionResult, ChainError>;
}
