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

//! Workflow requests and their line items.
//!
//! All four request kinds share one state machine:
//!
//! ```text
//! Draft ──submit──► Pending ──approve──► Approved ──issue──► PartiallyIssued ──► FullyIssued
//!                      │                                            │                  │
//!                      └──reject──► Rejected                        └──────complete────┴──► Completed
//!
//! Cancelled is reachable from Draft and Pending only.
//! ```
//!
//! Statuses are a closed enum; a command against a request whose status does
//! not permit it fails with
//! [`InvalidTransition`](crate::InventoryError::InvalidTransition).

use crate::base::{ActorId, ItemId, RequestId, WarehouseId};
use crate::record::Pool;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four request kinds instantiating the generic workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Material requisition drawn from one warehouse.
    Requisition,
    /// Inter-warehouse transfer, source debited on issue, destination
    /// credited on receive.
    Transfer,
    /// Project bill of quantity, reissuable as a "remaining" spin-off.
    Boq,
    /// Operational custody: material signed out to a worker, later returned,
    /// consumed, or handed to another worker.
    Custody,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Requisition => write!(f, "requisition"),
            RequestKind::Transfer => write!(f, "transfer"),
            RequestKind::Boq => write!(f, "bill of quantity"),
            RequestKind::Custody => write!(f, "custody"),
        }
    }
}

/// Request lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    PartiallyIssued,
    FullyIssued,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Rejected | RequestStatus::Completed | RequestStatus::Cancelled
        )
    }

    pub(crate) fn allows_submit(&self) -> bool {
        matches!(self, RequestStatus::Draft)
    }

    pub(crate) fn allows_decision(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    pub(crate) fn allows_issue(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::PartiallyIssued)
    }

    pub(crate) fn allows_receive(&self) -> bool {
        matches!(
            self,
            RequestStatus::PartiallyIssued | RequestStatus::FullyIssued
        )
    }

    pub(crate) fn allows_cancel(&self) -> bool {
        matches!(self, RequestStatus::Draft | RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::PartiallyIssued => "partially issued",
            RequestStatus::FullyIssued => "fully issued",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One line of a request: an item drawn from (or moved between) warehouses.
///
/// Lines are created with the parent request and mutated only through
/// workflow transitions; they are never deleted individually — cancellation
/// is a request-level status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item: ItemId,
    /// Warehouse the stock is drawn from.
    pub source: WarehouseId,
    /// Destination warehouse; transfers only.
    pub destination: Option<WarehouseId>,
    /// Draw from the commander's reserve instead of the general pool.
    pub uses_reserve: bool,
    pub requested: Decimal,
    pub approved: Decimal,
    pub issued: Decimal,
    /// Quantity received at destination (Transfer), acknowledged as consumed
    /// (Requisition/BOQ), or returned to the warehouse (Custody).
    pub received: Decimal,
    /// Quantity consumed in the field; custody only.
    pub consumed: Decimal,
    /// The reserve gate denied this line at approval; it waits for the
    /// commander's sign-off.
    pub awaiting_reserve_approval: bool,
    pub notes: Option<String>,
}

impl LineItem {
    pub fn new(item: ItemId, source: WarehouseId, requested: Decimal) -> Self {
        Self {
            item,
            source,
            destination: None,
            uses_reserve: false,
            requested,
            approved: Decimal::ZERO,
            issued: Decimal::ZERO,
            received: Decimal::ZERO,
            consumed: Decimal::ZERO,
            awaiting_reserve_approval: false,
            notes: None,
        }
    }

    pub fn with_reserve(mut self) -> Self {
        self.uses_reserve = true;
        self
    }

    pub fn with_destination(mut self, warehouse: WarehouseId) -> Self {
        self.destination = Some(warehouse);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn pool(&self) -> Pool {
        if self.uses_reserve {
            Pool::Reserve
        } else {
            Pool::General
        }
    }

    /// Approved but not yet issued; still held as a reservation.
    pub fn remaining_to_issue(&self) -> Decimal {
        self.approved - self.issued
    }

    /// Issued but not yet received/returned.
    pub fn unreceived(&self) -> Decimal {
        self.issued - self.received
    }

    /// Custody: issued and still out with the holder.
    pub fn outstanding(&self) -> Decimal {
        self.issued - self.received - self.consumed
    }
}

#[derive(Debug)]
pub(crate) struct RequestData {
    pub id: RequestId,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub requester: ActorId,
    pub lines: Vec<LineItem>,
    /// Commander sign-off covering this request's reserve-pool lines.
    /// Independent of the workflow approval itself.
    pub commander_reserve_approved: bool,
    pub rejection_reason: Option<String>,
    /// Actor who approved or rejected the request.
    pub decided_by: Option<ActorId>,
    /// Actor whose command closed the request (completion or cancellation).
    pub closed_by: Option<ActorId>,
    /// Current holder of custody material; custody only.
    pub custody_holder: Option<ActorId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub first_issued_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl RequestData {
    pub(crate) fn new(
        id: RequestId,
        kind: RequestKind,
        requester: ActorId,
        lines: Vec<LineItem>,
    ) -> Self {
        Self {
            id,
            kind,
            status: RequestStatus::Draft,
            requester,
            lines,
            commander_reserve_approved: false,
            rejection_reason: None,
            decided_by: None,
            closed_by: None,
            custody_holder: if kind == RequestKind::Custody {
                Some(requester)
            } else {
                None
            },
            version: 0,
            created_at: Utc::now(),
            submitted_at: None,
            decided_at: None,
            first_issued_at: None,
            closed_at: None,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }
}

/// One workflow request guarded by its own mutex, so two concurrent commands
/// against the same request serialize and cannot double-reserve a line.
#[derive(Debug)]
pub struct WorkflowRequest {
    inner: Mutex<RequestData>,
}

impl WorkflowRequest {
    pub(crate) fn new(data: RequestData) -> Self {
        Self {
            inner: Mutex::new(data),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RequestData> {
        self.inner.lock()
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot::from_data(&self.inner.lock())
    }
}

/// Serializable point-in-time copy of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub requester: ActorId,
    pub lines: Vec<LineItem>,
    pub commander_reserve_approved: bool,
    pub rejection_reason: Option<String>,
    pub decided_by: Option<ActorId>,
    pub closed_by: Option<ActorId>,
    pub custody_holder: Option<ActorId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub first_issued_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl RequestSnapshot {
    pub(crate) fn from_data(data: &RequestData) -> Self {
        Self {
            id: data.id,
            kind: data.kind,
            status: data.status,
            requester: data.requester,
            lines: data.lines.clone(),
            commander_reserve_approved: data.commander_reserve_approved,
            rejection_reason: data.rejection_reason.clone(),
            decided_by: data.decided_by,
            closed_by: data.closed_by,
            custody_holder: data.custody_holder,
            version: data.version,
            created_at: data.created_at,
            submitted_at: data.submitted_at,
            decided_at: data.decided_at,
            first_issued_at: data.first_issued_at,
            closed_at: data.closed_at,
        }
    }

    /// Custody: whether material is still out past the kind's custody limit.
    /// Derived at read time, never stored.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        let Some(limit) = self.kind.policy().custody_limit_days else {
            return false;
        };
        let Some(issued_at) = self.first_issued_at else {
            return false;
        };
        let outstanding = self
            .lines
            .iter()
            .any(|line| line.outstanding() > Decimal::ZERO);
        outstanding && (now - issued_at).num_days() > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn terminal_statuses() {
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(!RequestStatus::PartiallyIssued.is_terminal());
    }

    #[test]
    fn cancel_only_before_approval() {
        assert!(RequestStatus::Draft.allows_cancel());
        assert!(RequestStatus::Pending.allows_cancel());
        assert!(!RequestStatus::Approved.allows_cancel());
        assert!(!RequestStatus::FullyIssued.allows_cancel());
    }

    #[test]
    fn line_item_pool_follows_reserve_flag() {
        let general = LineItem::new(ItemId(1), WarehouseId(1), dec!(10));
        let reserve = LineItem::new(ItemId(1), WarehouseId(1), dec!(10)).with_reserve();
        assert_eq!(general.pool(), Pool::General);
        assert_eq!(reserve.pool(), Pool::Reserve);
    }

    #[test]
    fn line_item_quantity_arithmetic() {
        let mut line = LineItem::new(ItemId(1), WarehouseId(1), dec!(50));
        line.approved = dec!(40);
        line.issued = dec!(30);
        line.received = dec!(5);
        line.consumed = dec!(10);
        assert_eq!(line.remaining_to_issue(), dec!(10));
        assert_eq!(line.unreceived(), dec!(25));
        assert_eq!(line.outstanding(), dec!(15));
    }

    #[test]
    fn custody_requests_start_held_by_requester() {
        let data = RequestData::new(
            RequestId(1),
            RequestKind::Custody,
            ActorId(7),
            vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(5))],
        );
        assert_eq!(data.custody_holder, Some(ActorId(7)));
    }

    #[test]
    fn overdue_is_derived_from_issue_time_and_outstanding() {
        let mut data = RequestData::new(
            RequestId(1),
            RequestKind::Custody,
            ActorId(7),
            vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(5))],
        );
        data.lines[0].approved = dec!(5);
        data.lines[0].issued = dec!(5);
        data.first_issued_at = Some(Utc::now() - chrono::Duration::days(45));
        let snapshot = RequestSnapshot::from_data(&data);
        assert!(snapshot.is_overdue(Utc::now()));

        // Everything returned: nothing outstanding, nothing overdue.
        data.lines[0].received = dec!(5);
        let snapshot = RequestSnapshot::from_data(&data);
        assert!(!snapshot.is_overdue(Utc::now()));
    }

    #[test]
    fn non_custody_requests_never_go_overdue() {
        let mut data = RequestData::new(
            RequestId(1),
            RequestKind::Requisition,
            ActorId(7),
            vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(5))],
        );
        data.first_issued_at = Some(Utc::now() - chrono::Duration::days(400));
        data.lines[0].issued = dec!(5);
        let snapshot = RequestSnapshot::from_data(&data);
        assert!(!snapshot.is_overdue(Utc::now()));
    }
}
