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

//! Per-kind workflow parameters.
//!
//! The four request kinds share one state-machine core; everything that
//! differs between them lives in this table, so the shared invariants are
//! enforced exactly once.

use crate::error::InventoryError;
use crate::request::{LineItem, RequestKind};
use rust_decimal::Decimal;

/// What a request kind layers on the generic workflow skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    /// May lines draw from the commander's reserve?
    pub allows_reserve_pool: bool,
    /// Must lines name a destination warehouse?
    pub requires_destination: bool,
    /// May a partially issued request spin off a "remaining" follow-up?
    pub supports_remainder: bool,
    /// Days material may stay out before the request reads as overdue.
    pub custody_limit_days: Option<i64>,
}

impl RequestKind {
    pub fn policy(self) -> KindPolicy {
        match self {
            RequestKind::Requisition => KindPolicy {
                allows_reserve_pool: true,
                requires_destination: false,
                supports_remainder: false,
                custody_limit_days: None,
            },
            RequestKind::Transfer => KindPolicy {
                allows_reserve_pool: true,
                requires_destination: true,
                supports_remainder: false,
                custody_limit_days: None,
            },
            RequestKind::Boq => KindPolicy {
                allows_reserve_pool: true,
                requires_destination: false,
                supports_remainder: true,
                custody_limit_days: None,
            },
            RequestKind::Custody => KindPolicy {
                allows_reserve_pool: false,
                requires_destination: false,
                supports_remainder: false,
                custody_limit_days: Some(30),
            },
        }
    }
}

/// Validates a request's lines against its kind policy at creation time.
pub(crate) fn validate_lines(
    kind: RequestKind,
    lines: &[LineItem],
) -> Result<(), InventoryError> {
    let policy = kind.policy();
    for line in lines {
        if line.requested < Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        if line.uses_reserve && !policy.allows_reserve_pool {
            return Err(InventoryError::ReserveNotEligible);
        }
        if policy.requires_destination && line.destination.is_none() {
            return Err(InventoryError::DestinationRequired);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ItemId, WarehouseId};
    use rust_decimal_macros::dec;

    #[test]
    fn custody_is_general_pool_only() {
        assert!(!RequestKind::Custody.policy().allows_reserve_pool);
        let line = LineItem::new(ItemId(1), WarehouseId(1), dec!(5)).with_reserve();
        assert_eq!(
            validate_lines(RequestKind::Custody, &[line]),
            Err(InventoryError::ReserveNotEligible)
        );
    }

    #[test]
    fn transfers_require_a_destination() {
        let line = LineItem::new(ItemId(1), WarehouseId(1), dec!(5));
        assert_eq!(
            validate_lines(RequestKind::Transfer, &[line.clone()]),
            Err(InventoryError::DestinationRequired)
        );
        assert!(validate_lines(RequestKind::Transfer, &[line.with_destination(WarehouseId(2))]).is_ok());
    }

    #[test]
    fn only_boq_supports_remainder_spin_off() {
        assert!(RequestKind::Boq.policy().supports_remainder);
        assert!(!RequestKind::Requisition.policy().supports_remainder);
        assert!(!RequestKind::Transfer.policy().supports_remainder);
        assert!(!RequestKind::Custody.policy().supports_remainder);
    }

    #[test]
    fn only_custody_has_an_aging_limit() {
        assert_eq!(RequestKind::Custody.policy().custody_limit_days, Some(30));
        assert_eq!(RequestKind::Boq.policy().custody_limit_days, None);
    }

    #[test]
    fn negative_requested_quantity_is_rejected() {
        let line = LineItem::new(ItemId(1), WarehouseId(1), dec!(-5));
        assert_eq!(
            validate_lines(RequestKind::Requisition, &[line]),
            Err(InventoryError::InvalidQuantity)
        );
    }
}
