// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side transaction manager: correlates outstanding requests with
//! incoming responses, enforces timeouts/retries, and tracks the lifecycle
//! of each submission as an explicit state machine
//! (`Pending -> AwaitingReply -> {Complete, Retrying, TimedOut, Cancelled}`).
//!
//! This module is transport- and framer-agnostic: it only tracks which
//! transaction ids are outstanding and what response shape is expected for
//! each, mirroring the `AtomicU16` tid-allocation idiom already used by the
//! Socket client service, generalized to a full pending-transaction table.

use std::collections::HashMap;

use crate::{error::Error, frame::FunctionCode, slave::SlaveId};

/// Where a single submission currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    AwaitingReply,
    Complete,
    Retrying,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TransactionRecord {
    unit_id: SlaveId,
    function_code: FunctionCode,
    retries_left: u32,
    state: TransactionState,
}

/// What a caller should do after a deadline fires for a given transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Rebuild and retransmit the same ADU; the deadline should be reset.
    Retry,
    /// The retry budget is exhausted; complete the submission with `Timeout`.
    GiveUp,
}

/// Tracks outstanding transactions for a single connection.
///
/// Transaction ids are allocated from a monotonically-incrementing counter
/// modulo 2^16, skipping ids that are currently in use, per the spec's
/// shared-resource policy.
#[derive(Debug, Default)]
pub struct TransactionManager {
    next_tid: u16,
    pending: HashMap<u16, TransactionRecord>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh transaction id and register a new `Pending` record
    /// for it. Returns the allocated id.
    pub fn submit(&mut self, unit_id: SlaveId, function_code: FunctionCode, retries: u32) -> u16 {
        let tid = self.allocate_tid();
        self.pending.insert(
            tid,
            TransactionRecord {
                unit_id,
                function_code,
                retries_left: retries,
                state: TransactionState::AwaitingReply,
            },
        );
        tid
    }

    fn allocate_tid(&mut self) -> u16 {
        loop {
            let candidate = self.next_tid;
            self.next_tid = self.next_tid.wrapping_add(1);
            if !self.pending.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Attempt to match an incoming frame against a pending record.
    ///
    /// On success the record is removed (the transaction completed) and
    /// `Ok(())` is returned. A tid that matches no live record is a stale or
    /// duplicate response: it is dropped and logged, returning `Ok(None)`
    /// semantics via `Err(Error::ConnectionClosed)`... no: see below.
    pub fn on_response(
        &mut self,
        tid: u16,
        unit_id: SlaveId,
        function_code: FunctionCode,
    ) -> MatchOutcome {
        let Some(record) = self.pending.get(&tid) else {
            log::warn!("dropping response for unknown or stale transaction id {tid}");
            return MatchOutcome::Stale;
        };
        let expected_exception_fc = record.function_code | 0x80;
        if record.unit_id != unit_id
            || (function_code != record.function_code && function_code != expected_exception_fc)
        {
            let expected_unit_id = record.unit_id;
            let expected_function_code = record.function_code;
            self.pending.remove(&tid);
            log::warn!(
                "invalid response for transaction {tid}: expected unit {} fc {}, got unit {} fc {}",
                expected_unit_id,
                expected_function_code,
                unit_id,
                function_code
            );
            return MatchOutcome::Invalid;
        }
        self.pending.remove(&tid);
        MatchOutcome::Matched
    }

    /// Called when a transaction's deadline fires without a response.
    pub fn on_timeout(&mut self, tid: u16) -> TimeoutAction {
        let Some(record) = self.pending.get_mut(&tid) else {
            return TimeoutAction::GiveUp;
        };
        if record.retries_left > 0 {
            record.retries_left -= 1;
            record.state = TransactionState::Retrying;
            TimeoutAction::Retry
        } else {
            record.state = TransactionState::TimedOut;
            self.pending.remove(&tid);
            TimeoutAction::GiveUp
        }
    }

    /// Remove a pending transaction; any later bytes matching its tid are
    /// discarded by `on_response` (it will report `Stale`).
    pub fn cancel(&mut self, tid: u16) {
        self.pending.remove(&tid);
    }

    /// Complete every outstanding transaction with `ConnectionClosed`,
    /// draining the pending table. Used when the transport reports EOF.
    pub fn fail_all(&mut self) -> Vec<u16> {
        self.pending.drain().map(|(tid, _)| tid).collect()
    }

    pub fn is_pending(&self, tid: u16) -> bool {
        self.pending.contains_key(&tid)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// The outcome of matching an incoming frame against the pending table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The response matched a live record; the record has been removed.
    Matched,
    /// The tid matched a live record but unit id or function code disagreed;
    /// the record has been removed and the caller should surface
    /// `Error::InvalidResponse`.
    Invalid,
    /// No live record has this tid; the response was logged and dropped.
    Stale,
}

impl MatchOutcome {
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            MatchOutcome::Matched => Ok(()),
            MatchOutcome::Invalid => Err(Error::InvalidResponse(
                "transaction id matched but unit/function code disagreed".into(),
            )),
            MatchOutcome::Stale => Ok(()),
        }
    }
}
