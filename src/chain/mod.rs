// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sui integration module.
//!
//! This module provides functionality for:
//! - Reading objects, owned objects and dynamic fields over JSON-RPC
//! - Describing programmable transactions (`seal_approve`, `subscribe`)
//! - The seams through which transactions are built and executed externally

pub mod client;
pub mod transactions;
pub mod types;

pub use client::{ChainError, ChainReader, SuiClient};
pub use transactions::{
    ApprovalConstructor, Argument, ExecutionResult, MoveCall, ProgrammableTransaction,
    SubscriptionApproval, TransactionExecutor, TransactionKindBuilder,
};
pub use types::*;
