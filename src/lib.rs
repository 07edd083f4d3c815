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

//! # Depot Ledger
//!
//! A warehouse-inventory engine for a multi-factory complex. Stock is tracked
//! per (item, warehouse) as two co-existing pools — general stock and a
//! privileged commander's reserve — and four request workflows (requisitions,
//! inter-warehouse transfers, project bills of quantity, and worker custody)
//! draw against those pools through staged approval, partial fulfillment, and
//! return/consumption steps.
//!
//! ## Core Components
//!
//! - [`Ledger`]: dual-pool stock quantities; the only component that mutates
//!   them, journaling every committed change
//! - [`TransactionLog`]: append-only record of quantity mutations with
//!   before/after snapshots
//! - [`ReservationEngine`]: available-to-promise and partial satisfaction
//! - [`authorize_reserve`]: the commander's-reserve authorization gate
//! - [`WorkflowEngine`]: the shared request state machine, parameterized per
//!   kind by [`KindPolicy`]
//!
//! ## Example
//!
//! ```
//! use depot_ledger::{
//!     Actor, ActorId, ItemId, Ledger, LineItem, Pool, RequestKind, Role,
//!     WarehouseId, WorkflowEngine,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(Ledger::new());
//! ledger
//!     .credit(ItemId(1), WarehouseId(1), Pool::General, dec!(150), ActorId(1), None)
//!     .unwrap();
//!
//! let engine = WorkflowEngine::new(Arc::clone(&ledger));
//! let draft = engine
//!     .create(
//!         RequestKind::Requisition,
//!         Actor::new(ActorId(10), Role::Worker),
//!         vec![LineItem::new(ItemId(1), WarehouseId(1), dec!(200))],
//!     )
//!     .unwrap();
//! engine.submit(draft.id, None).unwrap();
//!
//! // Only 150 of the 200 requested are available; the shortfall is explicit.
//! let outcome = engine
//!     .approve(draft.id, Actor::new(ActorId(20), Role::DepartmentHead), &[], None)
//!     .unwrap();
//! assert_eq!(outcome.request.lines[0].approved, dec!(150));
//! assert_eq!(outcome.shortfalls[0].shortfall, dec!(50));
//! ```
//!
//! ## Thread Safety
//!
//! Records and requests live in concurrent maps; each guards its data behind
//! its own mutex, so operations on different (item, warehouse) pairs and
//! different requests proceed fully in parallel while every read-modify-write
//! of one record is serialized. Approve never queues for stock: it reserves
//! what is available now and reports the shortfall.

pub mod auth;
mod base;
pub mod error;
mod journal;
mod ledger;
mod policy;
pub mod record;
pub mod request;
mod reservation;
mod workflow;

pub use auth::{Actor, ReserveOp, Role, authorize_reserve};
pub use base::{ActorId, EntryId, ItemId, RequestId, StockKey, WarehouseId};
pub use error::InventoryError;
pub use journal::{JournalEntry, JournalFilter, Origin, TransactionLog};
pub use ledger::{Ledger, WarehouseSummary};
pub use policy::KindPolicy;
pub use record::{InventoryRecord, Pool, RecordSnapshot, StockStatus};
pub use request::{LineItem, RequestKind, RequestSnapshot, RequestStatus, WorkflowRequest};
pub use reservation::{ReservationEngine, ReserveOutcome};
pub use workflow::{
    CommandOutcome, LineAmount, LineApproval, LineShortfall, ShortfallReason, SpinOff,
    StatusEvent, WorkflowEngine,
};
