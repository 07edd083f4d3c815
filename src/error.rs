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

//! Error types for ledger and workflow operations.
//!
//! Insufficiency ([`InventoryError::InsufficientAvailable`]) and authorization
//! denial ([`InventoryError::ReserveAuthorizationDenied`]) are deliberately
//! distinct kinds so callers can present "not enough stock" and "ask the
//! commander" as different situations.

use crate::auth::{ReserveOp, Role};
use crate::request::{RequestKind, RequestStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger and workflow processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// No inventory record exists for the referenced (item, warehouse) pair
    #[error("no inventory record for this item and warehouse")]
    RecordNotFound,

    /// Referenced request id does not exist
    #[error("request not found")]
    RequestNotFound,

    /// Referenced line item index does not exist on the request
    #[error("line item {0} not found")]
    LineNotFound(usize),

    /// Quantity is zero or negative where a positive amount is required
    #[error("invalid quantity (must be positive)")]
    InvalidQuantity,

    /// The mutation would break a ledger invariant; nothing was applied
    #[error("ledger invariant would be violated: {0}")]
    InvariantViolation(&'static str),

    /// Requested quantity exceeds what the pool can currently supply;
    /// carries the achievable amount so the caller can choose partial fulfillment
    #[error("insufficient available stock ({available} available)")]
    InsufficientAvailable { available: Decimal },

    /// Actor lacks the role required to touch the commander's reserve
    #[error("{operation} on the commander's reserve requires a reserve custodian (actor is {role})")]
    ReserveAuthorizationDenied { role: Role, operation: ReserveOp },

    /// Command issued against a request whose status does not permit it
    #[error("command not allowed while request is {status}")]
    InvalidTransition { status: RequestStatus },

    /// The request changed underneath the caller; re-read and retry
    #[error("request was modified concurrently, retry with the current version")]
    ConcurrentModification,

    /// Rejection requires a non-empty reason
    #[error("rejection requires a reason")]
    MissingReason,

    /// Submit requires at least one line item with a positive requested quantity
    #[error("request has no line items with a positive requested quantity")]
    EmptyRequest,

    /// Transfer line items must name a destination warehouse
    #[error("transfer line items require a destination warehouse")]
    DestinationRequired,

    /// This request kind may not draw from the commander's reserve
    #[error("this request kind may only draw from the general pool")]
    ReserveNotEligible,

    /// Only the requester may cancel a request
    #[error("only the requester may cancel this request")]
    NotRequester,

    /// Command is not part of this request kind's workflow
    #[error("operation not supported for {kind} requests")]
    UnsupportedForKind { kind: RequestKind },
}

#[cfg(test)]
mod tests {
    use super::InventoryError;
    use crate::auth::{ReserveOp, Role};
    use crate::request::{RequestKind, RequestStatus};
    use rust_decimal_macros::dec;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            InventoryError::RecordNotFound.to_string(),
            "no inventory record for this item and warehouse"
        );
        assert_eq!(InventoryError::RequestNotFound.to_string(), "request not found");
        assert_eq!(InventoryError::LineNotFound(3).to_string(), "line item 3 not found");
        assert_eq!(
            InventoryError::InvalidQuantity.to_string(),
            "invalid quantity (must be positive)"
        );
        assert_eq!(
            InventoryError::InsufficientAvailable { available: dec!(12) }.to_string(),
            "insufficient available stock (12 available)"
        );
        assert_eq!(
            InventoryError::ReserveAuthorizationDenied {
                role: Role::DepartmentHead,
                operation: ReserveOp::Reserve,
            }
            .to_string(),
            "reserve on the commander's reserve requires a reserve custodian (actor is department head)"
        );
        assert_eq!(
            InventoryError::InvalidTransition { status: RequestStatus::Rejected }.to_string(),
            "command not allowed while request is rejected"
        );
        assert_eq!(InventoryError::MissingReason.to_string(), "rejection requires a reason");
        assert_eq!(
            InventoryError::UnsupportedForKind { kind: RequestKind::Requisition }.to_string(),
            "operation not supported for requisition requests"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = InventoryError::InsufficientAvailable { available: dec!(5) };
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
