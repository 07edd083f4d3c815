// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The workflow engine: one state-machine core shared by all four request
//! kinds.
//!
//! Each command locks the request's own mutex for its whole read-modify-write,
//! so two concurrent approvals cannot double-reserve a line. Ledger calls made
//! while a request is locked take the per-record mutex underneath; the ledger
//! never locks requests, so the lock order is acyclic.
//!
//! Partial success is a first-class outcome: approve and issue return per-line
//! [`LineShortfall`]s instead of silently clamping, and a request may sit
//! `PartiallyIssued` indefinitely, receiving further issues as stock arrives.
//!
//! Status changes are published as [`StatusEvent`]s on an optional channel
//! for the external notification sink.

use crate::auth::{Actor, ReserveOp, authorize_reserve};
use crate::base::{ActorId, RequestId};
use crate::error::InventoryError;
use crate::journal::Origin;
use crate::ledger::Ledger;
use crate::policy::validate_lines;
use crate::record::Pool;
use crate::request::{
    LineItem, RequestData, RequestKind, RequestSnapshot, RequestStatus, WorkflowRequest,
};
use crate::reservation::ReservationEngine;
use chrono::{DateTime, Utc};
use crossbeam::channel::Sender;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Caller-supplied approval override for one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineApproval {
    pub line: usize,
    pub quantity: Decimal,
}

/// One line's issue (or receive/return/consume) amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineAmount {
    pub line: usize,
    pub quantity: Decimal,
}

/// Why a line could not be fulfilled in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortfallReason {
    /// The pool could not supply the full amount.
    InsufficientStock,
    /// The reserve gate denied the line; it waits for commander sign-off.
    AwaitingReserveApproval,
    /// Asked to issue more than the approved remainder.
    ExceedsApproved,
    /// Asked to receive or return more than was issued.
    ExceedsIssued,
}

/// Per-line report of a partially (or un-) fulfilled amount.
///
/// The caller must see and accept the reduced quantity; the engine never
/// clamps silently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineShortfall {
    pub line: usize,
    pub requested: Decimal,
    pub fulfilled: Decimal,
    pub shortfall: Decimal,
    pub reason: ShortfallReason,
}

/// Updated request plus any per-line shortfalls.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub request: RequestSnapshot,
    pub shortfalls: Vec<LineShortfall>,
}

/// Result of spinning off a remaining BOQ.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinOff {
    /// The original request, now completed.
    pub original: RequestSnapshot,
    /// New draft requesting each line's unissued remainder.
    pub remainder: RequestSnapshot,
}

/// A request status change, published for the notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub request: RequestId,
    pub kind: RequestKind,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub at: DateTime<Utc>,
}

/// Generic workflow engine over the inventory ledger.
pub struct WorkflowEngine {
    ledger: Arc<Ledger>,
    reservations: ReservationEngine,
    requests: DashMap<RequestId, WorkflowRequest>,
    next_id: AtomicU64,
    events: Option<Sender<StatusEvent>>,
}

impl WorkflowEngine {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            reservations: ReservationEngine::new(Arc::clone(&ledger)),
            ledger,
            requests: DashMap::new(),
            next_id: AtomicU64::new(1),
            events: None,
        }
    }

    /// Engine that publishes status changes on `events`.
    pub fn with_events(ledger: Arc<Ledger>, events: Sender<StatusEvent>) -> Self {
        let mut engine = Self::new(ledger);
        engine.events = Some(events);
        engine
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Current state of a request.
    pub fn get(&self, id: RequestId) -> Option<RequestSnapshot> {
        self.requests.get(&id).map(|request| request.snapshot())
    }

    /// Custody requests whose material is out past the custody limit.
    pub fn overdue_custody(&self, now: DateTime<Utc>) -> Vec<RequestSnapshot> {
        self.requests
            .iter()
            .map(|request| request.snapshot())
            .filter(|snapshot| snapshot.is_overdue(now))
            .collect()
    }

    /// Creates a draft request after validating its lines against the kind
    /// policy.
    pub fn create(
        &self,
        kind: RequestKind,
        requester: Actor,
        lines: Vec<LineItem>,
    ) -> Result<RequestSnapshot, InventoryError> {
        validate_lines(kind, &lines)?;
        Ok(self.insert_draft(kind, requester.id, lines))
    }

    fn insert_draft(
        &self,
        kind: RequestKind,
        requester: ActorId,
        lines: Vec<LineItem>,
    ) -> RequestSnapshot {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let data = RequestData::new(id, kind, requester, lines);
        let snapshot = RequestSnapshot::from_data(&data);
        self.requests.insert(id, WorkflowRequest::new(data));
        snapshot
    }

    /// Draft → Pending. Requires at least one line with a positive requested
    /// quantity.
    pub fn submit(
        &self,
        id: RequestId,
        expected_version: Option<u64>,
    ) -> Result<RequestSnapshot, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if !data.status.allows_submit() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        if !data
            .lines
            .iter()
            .any(|line| line.requested > Decimal::ZERO)
        {
            return Err(InventoryError::EmptyRequest);
        }
        data.submitted_at = Some(Utc::now());
        self.transition(&mut data, RequestStatus::Pending);
        Ok(RequestSnapshot::from_data(&data))
    }

    /// Pending → Approved, partial allowed.
    ///
    /// Per line the reservation engine soft-holds
    /// `min(approved quantity, available)` from the line's pool. Lines not
    /// named in `overrides` are approved at their requested quantity. A
    /// reserve line failing the gate is left at zero, flagged for
    /// re-approval once the commander signs off, and reported as a shortfall
    /// — the request as a whole is not blocked.
    pub fn approve(
        &self,
        id: RequestId,
        approver: Actor,
        overrides: &[LineApproval],
        expected_version: Option<u64>,
    ) -> Result<CommandOutcome, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if !data.status.allows_decision() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }

        let mut targets: Vec<Decimal> = data.lines.iter().map(|line| line.requested).collect();
        for approval in overrides {
            let requested = data
                .lines
                .get(approval.line)
                .map(|line| line.requested)
                .ok_or(InventoryError::LineNotFound(approval.line))?;
            if approval.quantity < Decimal::ZERO || approval.quantity > requested {
                return Err(InventoryError::InvalidQuantity);
            }
            targets[approval.line] = approval.quantity;
        }

        // Validate every referenced record up front so a missing one cannot
        // abort the loop after siblings were already reserved.
        for (line, target) in data.lines.iter().zip(&targets) {
            if *target > Decimal::ZERO && self.ledger.get(line.item, line.source).is_none() {
                return Err(InventoryError::RecordNotFound);
            }
        }

        let gate_cleared = data.commander_reserve_approved
            || approver.role.is_reserve_custodian();
        if approver.role.is_reserve_custodian()
            && data
                .lines
                .iter()
                .zip(&targets)
                .any(|(line, target)| line.uses_reserve && *target > Decimal::ZERO)
        {
            data.commander_reserve_approved = true;
        }

        let mut shortfalls = Vec::new();
        for (index, target) in targets.iter().enumerate() {
            let line = &mut data.lines[index];
            if *target <= Decimal::ZERO {
                line.approved = Decimal::ZERO;
                continue;
            }
            if line.uses_reserve && !gate_cleared {
                line.approved = Decimal::ZERO;
                line.awaiting_reserve_approval = true;
                shortfalls.push(LineShortfall {
                    line: index,
                    requested: *target,
                    fulfilled: Decimal::ZERO,
                    shortfall: *target,
                    reason: ShortfallReason::AwaitingReserveApproval,
                });
                continue;
            }
            let outcome =
                self.reservations
                    .hold(line.item, line.source, line.pool(), *target)?;
            line.approved = outcome.reserved;
            if outcome.shortfall > Decimal::ZERO {
                shortfalls.push(LineShortfall {
                    line: index,
                    requested: *target,
                    fulfilled: outcome.reserved,
                    shortfall: outcome.shortfall,
                    reason: ShortfallReason::InsufficientStock,
                });
            }
        }

        data.decided_by = Some(approver.id);
        data.decided_at = Some(Utc::now());
        self.transition(&mut data, RequestStatus::Approved);
        Ok(CommandOutcome {
            request: RequestSnapshot::from_data(&data),
            shortfalls,
        })
    }

    /// Commander sign-off: reserves the lines the gate deferred at approval.
    ///
    /// Gate-checked; sets the request's `commander_reserve_approved` flag and
    /// approves each flagged line at its requested quantity, with shortfalls
    /// possible.
    pub fn approve_reserve_lines(
        &self,
        id: RequestId,
        commander: Actor,
        expected_version: Option<u64>,
    ) -> Result<CommandOutcome, InventoryError> {
        authorize_reserve(commander.role, ReserveOp::Reserve)?;
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if !matches!(
            data.status,
            RequestStatus::Approved | RequestStatus::PartiallyIssued
        ) {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }

        data.commander_reserve_approved = true;
        let mut shortfalls = Vec::new();
        for index in 0..data.lines.len() {
            let line = &mut data.lines[index];
            if !line.awaiting_reserve_approval {
                continue;
            }
            let requested = line.requested;
            let outcome =
                self.reservations
                    .hold(line.item, line.source, line.pool(), requested)?;
            let line = &mut data.lines[index];
            line.approved = outcome.reserved;
            line.awaiting_reserve_approval = false;
            if outcome.shortfall > Decimal::ZERO {
                shortfalls.push(LineShortfall {
                    line: index,
                    requested,
                    fulfilled: outcome.reserved,
                    shortfall: outcome.shortfall,
                    reason: ShortfallReason::InsufficientStock,
                });
            }
        }
        data.touch();
        Ok(CommandOutcome {
            request: RequestSnapshot::from_data(&data),
            shortfalls,
        })
    }

    /// Pending → Rejected. Requires a non-empty reason; nothing is reserved
    /// before approval, so there is nothing to release.
    pub fn reject(
        &self,
        id: RequestId,
        approver: Actor,
        reason: &str,
        expected_version: Option<u64>,
    ) -> Result<RequestSnapshot, InventoryError> {
        if reason.trim().is_empty() {
            return Err(InventoryError::MissingReason);
        }
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if !data.status.allows_decision() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        data.rejection_reason = Some(reason.trim().to_string());
        data.decided_by = Some(approver.id);
        data.decided_at = Some(Utc::now());
        self.transition(&mut data, RequestStatus::Rejected);
        Ok(RequestSnapshot::from_data(&data))
    }

    /// Approved | PartiallyIssued → PartiallyIssued | FullyIssued.
    ///
    /// Commits up to `min(asked, approved - issued)` per line through the
    /// ledger; the amount beyond that is reported as a shortfall, never
    /// silently taken. Reserve lines additionally require the commander's
    /// sign-off flag before their stock may leave.
    pub fn issue(
        &self,
        id: RequestId,
        actor: Actor,
        issues: &[LineAmount],
        expected_version: Option<u64>,
    ) -> Result<CommandOutcome, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if !data.status.allows_issue() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }

        // Validate everything before the first commit.
        for issue in issues {
            let line = data
                .lines
                .get(issue.line)
                .ok_or(InventoryError::LineNotFound(issue.line))?;
            if issue.quantity <= Decimal::ZERO {
                return Err(InventoryError::InvalidQuantity);
            }
            if line.uses_reserve && !data.commander_reserve_approved {
                return Err(InventoryError::ReserveAuthorizationDenied {
                    role: actor.role,
                    operation: ReserveOp::Reserve,
                });
            }
        }

        let origin = Origin {
            request: data.id,
            kind: data.kind,
        };
        let mut shortfalls = Vec::new();
        let mut committed_any = false;
        for issue in issues {
            let line = &mut data.lines[issue.line];
            let committable = issue.quantity.min(line.remaining_to_issue());
            if committable < issue.quantity {
                shortfalls.push(LineShortfall {
                    line: issue.line,
                    requested: issue.quantity,
                    fulfilled: committable.max(Decimal::ZERO),
                    shortfall: issue.quantity - committable.max(Decimal::ZERO),
                    reason: ShortfallReason::ExceedsApproved,
                });
            }
            if committable <= Decimal::ZERO {
                continue;
            }
            let (item, source, pool) = (line.item, line.source, line.pool());
            self.ledger
                .commit(item, source, pool, committable, actor.id, Some(origin))?;
            data.lines[issue.line].issued += committable;
            committed_any = true;
        }

        if committed_any && data.first_issued_at.is_none() {
            data.first_issued_at = Some(Utc::now());
        }
        self.refresh_issue_status(&mut data);
        Ok(CommandOutcome {
            request: RequestSnapshot::from_data(&data),
            shortfalls,
        })
    }

    /// Receive issued material.
    ///
    /// Transfers credit the destination warehouse; requisitions and BOQs
    /// acknowledge consumption without a ledger movement. If a destination
    /// credit fails the line's received quantity is untouched and the request
    /// stays recoverable — retry the receive. Auto-completes once fully
    /// issued and fully received.
    pub fn receive(
        &self,
        id: RequestId,
        actor: Actor,
        receipts: &[LineAmount],
        expected_version: Option<u64>,
    ) -> Result<CommandOutcome, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if data.kind == RequestKind::Custody {
            return Err(InventoryError::UnsupportedForKind { kind: data.kind });
        }
        if !data.status.allows_receive() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        for receipt in receipts {
            if data.lines.get(receipt.line).is_none() {
                return Err(InventoryError::LineNotFound(receipt.line));
            }
            if receipt.quantity <= Decimal::ZERO {
                return Err(InventoryError::InvalidQuantity);
            }
        }

        let origin = Origin {
            request: data.id,
            kind: data.kind,
        };
        let transfer = data.kind == RequestKind::Transfer;
        let mut shortfalls = Vec::new();
        for receipt in receipts {
            let line = &mut data.lines[receipt.line];
            let receivable = receipt.quantity.min(line.unreceived());
            if receivable < receipt.quantity {
                shortfalls.push(LineShortfall {
                    line: receipt.line,
                    requested: receipt.quantity,
                    fulfilled: receivable.max(Decimal::ZERO),
                    shortfall: receipt.quantity - receivable.max(Decimal::ZERO),
                    reason: ShortfallReason::ExceedsIssued,
                });
            }
            if receivable <= Decimal::ZERO {
                continue;
            }
            if transfer {
                let destination = line.destination.ok_or(InventoryError::DestinationRequired)?;
                let (item, pool) = (line.item, line.pool());
                self.ledger
                    .credit(item, destination, pool, receivable, actor.id, Some(origin))?;
            }
            data.lines[receipt.line].received += receivable;
        }

        if data.status == RequestStatus::FullyIssued
            && data
                .lines
                .iter()
                .all(|line| line.received == line.issued)
        {
            data.closed_by = Some(actor.id);
            data.closed_at = Some(Utc::now());
            self.transition(&mut data, RequestStatus::Completed);
        } else {
            data.touch();
        }
        Ok(CommandOutcome {
            request: RequestSnapshot::from_data(&data),
            shortfalls,
        })
    }

    /// Explicitly closes a partially or fully issued request, accepting any
    /// shortfall. Each line's unissued remainder is released back to its
    /// pool, so reservations never leak.
    pub fn complete(
        &self,
        id: RequestId,
        actor: Actor,
        expected_version: Option<u64>,
    ) -> Result<RequestSnapshot, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if !data.status.allows_receive() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        if data.kind == RequestKind::Custody
            && data
                .lines
                .iter()
                .any(|line| line.outstanding() > Decimal::ZERO)
        {
            // Material still out with the holder; return or consume it first.
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        self.release_remainders(&mut data);
        data.closed_by = Some(actor.id);
        data.closed_at = Some(Utc::now());
        self.transition(&mut data, RequestStatus::Completed);
        Ok(RequestSnapshot::from_data(&data))
    }

    /// Draft | Pending → Cancelled, by the requester only. No ledger commit
    /// has happened yet; any speculative hold is released defensively.
    pub fn cancel(
        &self,
        id: RequestId,
        actor: Actor,
        expected_version: Option<u64>,
    ) -> Result<RequestSnapshot, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if actor.id != data.requester {
            return Err(InventoryError::NotRequester);
        }
        if !data.status.allows_cancel() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        self.release_remainders(&mut data);
        data.closed_by = Some(actor.id);
        data.closed_at = Some(Utc::now());
        self.transition(&mut data, RequestStatus::Cancelled);
        Ok(RequestSnapshot::from_data(&data))
    }

    /// Custody: returns material to the issuing warehouse's general pool.
    pub fn return_custody(
        &self,
        id: RequestId,
        actor: Actor,
        amount: LineAmount,
        expected_version: Option<u64>,
    ) -> Result<CommandOutcome, InventoryError> {
        self.custody_hand_back(id, actor, amount, expected_version, true)
    }

    /// Custody: records material as consumed in the field. The stock already
    /// left the warehouse at issue; nothing is credited back.
    pub fn consume_custody(
        &self,
        id: RequestId,
        actor: Actor,
        amount: LineAmount,
        expected_version: Option<u64>,
    ) -> Result<CommandOutcome, InventoryError> {
        self.custody_hand_back(id, actor, amount, expected_version, false)
    }

    fn custody_hand_back(
        &self,
        id: RequestId,
        actor: Actor,
        amount: LineAmount,
        expected_version: Option<u64>,
        credit_back: bool,
    ) -> Result<CommandOutcome, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if data.kind != RequestKind::Custody {
            return Err(InventoryError::UnsupportedForKind { kind: data.kind });
        }
        if !data.status.allows_receive() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        if amount.quantity <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        let line = data
            .lines
            .get(amount.line)
            .ok_or(InventoryError::LineNotFound(amount.line))?;

        let take = amount.quantity.min(line.outstanding()).max(Decimal::ZERO);
        let mut shortfalls = Vec::new();
        if take < amount.quantity {
            shortfalls.push(LineShortfall {
                line: amount.line,
                requested: amount.quantity,
                fulfilled: take,
                shortfall: amount.quantity - take,
                reason: ShortfallReason::ExceedsIssued,
            });
        }
        if take > Decimal::ZERO {
            if credit_back {
                let origin = Origin {
                    request: data.id,
                    kind: data.kind,
                };
                let (item, source) = (line.item, line.source);
                self.ledger
                    .credit(item, source, Pool::General, take, actor.id, Some(origin))?;
                data.lines[amount.line].received += take;
            } else {
                data.lines[amount.line].consumed += take;
            }
        }

        let settled = data.lines.iter().all(|line| {
            line.outstanding() <= Decimal::ZERO && line.issued == line.approved
        });
        let anything_issued = data.lines.iter().any(|line| line.issued > Decimal::ZERO);
        if settled && anything_issued {
            data.closed_by = Some(actor.id);
            data.closed_at = Some(Utc::now());
            self.transition(&mut data, RequestStatus::Completed);
        } else {
            data.touch();
        }
        Ok(CommandOutcome {
            request: RequestSnapshot::from_data(&data),
            shortfalls,
        })
    }

    /// Custody: reassigns the outstanding material to another worker without
    /// moving ledger quantity.
    pub fn transfer_custody(
        &self,
        id: RequestId,
        _actor: Actor,
        new_holder: ActorId,
        expected_version: Option<u64>,
    ) -> Result<RequestSnapshot, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if data.kind != RequestKind::Custody {
            return Err(InventoryError::UnsupportedForKind { kind: data.kind });
        }
        if !data.status.allows_receive() {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }
        data.custody_holder = Some(new_holder);
        data.touch();
        Ok(RequestSnapshot::from_data(&data))
    }

    /// BOQ: spins the unissued remainder off into a fresh draft and completes
    /// the original.
    ///
    /// The new draft requests each line's `requested - issued`; the
    /// original's unissued reservations are released.
    pub fn spin_off_remainder(
        &self,
        id: RequestId,
        actor: Actor,
        expected_version: Option<u64>,
    ) -> Result<SpinOff, InventoryError> {
        let request = self.request(id)?;
        let mut data = request.lock();
        check_version(&data, expected_version)?;
        if !data.kind.policy().supports_remainder {
            return Err(InventoryError::UnsupportedForKind { kind: data.kind });
        }
        if data.status != RequestStatus::PartiallyIssued {
            return Err(InventoryError::InvalidTransition { status: data.status });
        }

        let remainder_lines: Vec<LineItem> = data
            .lines
            .iter()
            .filter(|line| line.requested - line.issued > Decimal::ZERO)
            .map(|line| {
                let mut remainder =
                    LineItem::new(line.item, line.source, line.requested - line.issued);
                remainder.uses_reserve = line.uses_reserve;
                remainder.notes = line.notes.clone();
                remainder
            })
            .collect();

        self.release_remainders(&mut data);
        data.closed_by = Some(actor.id);
        data.closed_at = Some(Utc::now());
        self.transition(&mut data, RequestStatus::Completed);
        let original = RequestSnapshot::from_data(&data);
        let requester = data.requester;
        let kind = data.kind;
        // Drop the guard and the map ref before inserting: the new id may
        // land in the same shard.
        drop(data);
        drop(request);

        let remainder = self.insert_draft(kind, requester, remainder_lines);
        Ok(SpinOff {
            original,
            remainder,
        })
    }

    fn request(
        &self,
        id: RequestId,
    ) -> Result<dashmap::mapref::one::Ref<'_, RequestId, WorkflowRequest>, InventoryError> {
        self.requests.get(&id).ok_or(InventoryError::RequestNotFound)
    }

    fn refresh_issue_status(&self, data: &mut RequestData) {
        let total_approved: Decimal = data.lines.iter().map(|line| line.approved).sum();
        let fully = total_approved > Decimal::ZERO
            && data.lines.iter().all(|line| line.issued == line.approved);
        let any = data.lines.iter().any(|line| line.issued > Decimal::ZERO);
        let next = if fully {
            RequestStatus::FullyIssued
        } else if any {
            RequestStatus::PartiallyIssued
        } else {
            data.status
        };
        if next != data.status {
            self.transition(data, next);
        } else {
            data.touch();
        }
    }

    /// Releases each line's approved-but-unissued remainder back to its pool.
    /// Failures are logged, not propagated: the request is closing and the
    /// ledger clamps over-releases anyway.
    fn release_remainders(&self, data: &mut RequestData) {
        for line in &data.lines {
            let remaining = line.remaining_to_issue();
            if remaining <= Decimal::ZERO {
                continue;
            }
            if let Err(error) =
                self.ledger
                    .release(line.item, line.source, line.pool(), remaining)
            {
                warn!(request = %data.id, item = %line.item, %error, "failed to release remainder");
            }
        }
    }

    fn transition(&self, data: &mut RequestData, to: RequestStatus) {
        let from = data.status;
        data.status = to;
        data.touch();
        debug!(request = %data.id, kind = %data.kind, %from, %to, "request transition");
        if let Some(sender) = &self.events {
            let _ = sender.send(StatusEvent {
                request: data.id,
                kind: data.kind,
                from,
                to,
                at: Utc::now(),
            });
        }
    }
}

fn check_version(data: &RequestData, expected: Option<u64>) -> Result<(), InventoryError> {
    match expected {
        Some(version) if version != data.version => Err(InventoryError::ConcurrentModification),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::base::{ItemId, WarehouseId};
    use rust_decimal_macros::dec;

    fn engine_with_stock() -> WorkflowEngine {
        let ledger = Arc::new(Ledger::new());
        ledger
            .credit(ItemId(1), WarehouseId(1), Pool::General, dec!(100), ActorId(0), None)
            .unwrap();
        WorkflowEngine::new(ledger)
    }

    fn requester() -> Actor {
        Actor::new(ActorId(10), Role::Worker)
    }

    fn head() -> Actor {
        Actor::new(ActorId(20), Role::DepartmentHead)
    }

    #[test]
    fn version_mismatch_is_concurrent_modification() {
        let engine = engine_with_stock();
        let draft = engine
            .create(
                RequestKind::Requisition,
                requester(),
                vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(10))],
            )
            .unwrap();
        let stale = draft.version;
        engine.submit(draft.id, Some(stale)).unwrap();

        // The submit bumped the version; reusing the stale one fails.
        let result = engine.approve(draft.id, head(), &[], Some(stale));
        assert_eq!(result, Err(InventoryError::ConcurrentModification));
    }

    #[test]
    fn submit_requires_a_positive_line() {
        let engine = engine_with_stock();
        let draft = engine
            .create(
                RequestKind::Requisition,
                requester(),
                vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(0))],
            )
            .unwrap();
        assert_eq!(
            engine.submit(draft.id, None),
            Err(InventoryError::EmptyRequest)
        );
    }

    #[test]
    fn approve_override_above_requested_is_invalid() {
        let engine = engine_with_stock();
        let draft = engine
            .create(
                RequestKind::Requisition,
                requester(),
                vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(10))],
            )
            .unwrap();
        engine.submit(draft.id, None).unwrap();
        let result = engine.approve(
            draft.id,
            head(),
            &[LineApproval { line: 0, quantity: dec!(11) }],
            None,
        );
        assert_eq!(result, Err(InventoryError::InvalidQuantity));
    }

    #[test]
    fn cancel_is_requester_only() {
        let engine = engine_with_stock();
        let draft = engine
            .create(
                RequestKind::Requisition,
                requester(),
                vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(10))],
            )
            .unwrap();
        assert_eq!(
            engine.cancel(draft.id, head(), None),
            Err(InventoryError::NotRequester)
        );
        engine.cancel(draft.id, requester(), None).unwrap();
    }

    #[test]
    fn status_events_are_published() {
        let ledger = Arc::new(Ledger::new());
        ledger
            .credit(ItemId(1), WarehouseId(1), Pool::General, dec!(50), ActorId(0), None)
            .unwrap();
        let (sender, receiver) = crossbeam::channel::unbounded();
        let engine = WorkflowEngine::with_events(ledger, sender);

        let draft = engine
            .create(
                RequestKind::Requisition,
                requester(),
                vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(10))],
            )
            .unwrap();
        engine.submit(draft.id, None).unwrap();
        engine.approve(draft.id, head(), &[], None).unwrap();

        let events: Vec<StatusEvent> = receiver.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].from, RequestStatus::Draft);
        assert_eq!(events[0].to, RequestStatus::Pending);
        assert_eq!(events[1].to, RequestStatus::Approved);
    }
}
