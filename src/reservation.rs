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

//! Reservation engine: available-to-promise on top of the ledger.
//!
//! The engine knows which pool a line item draws from and supports partial
//! satisfaction: given a requested quantity it reserves
//! `min(requested, available)` and reports the shortfall, so the workflow
//! layer decides whether a partial approval is acceptable. It never queues or
//! blocks waiting for stock.
//!
//! Actor-facing operations consult the reserve authorization gate before
//! touching the reserve pool; denial is a typed error distinct from
//! insufficiency. The workflow engine unwinds its own holds through the
//! ledger directly — those releases were gated when the hold was created.

use crate::auth::{Actor, ReserveOp, authorize_reserve};
use crate::base::{ItemId, WarehouseId};
use crate::error::InventoryError;
use crate::ledger::Ledger;
use crate::record::Pool;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Result of a partial-satisfaction reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveOutcome {
    /// Amount actually soft-held.
    pub reserved: Decimal,
    /// Portion of the request that could not be satisfied.
    pub shortfall: Decimal,
}

/// Computes available-to-promise and performs atomic reserve/release against
/// the ledger on behalf of workflows.
pub struct ReservationEngine {
    ledger: Arc<Ledger>,
}

impl ReservationEngine {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Reserves up to `requested` from the pool without a gate check.
    ///
    /// Reserves `min(requested, available)` in one atomic step under the
    /// record's lock, so a concurrent reservation can shrink the amount held
    /// but never fail the hold with an insufficiency error. A zero
    /// reservation is a valid outcome (shortfall equals the full request).
    /// The caller must have cleared the reserve gate when `pool` is the
    /// commander's reserve.
    pub(crate) fn hold(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        requested: Decimal,
    ) -> Result<ReserveOutcome, InventoryError> {
        let reserved = self.ledger.reserve_up_to(item, warehouse, pool, requested)?;
        Ok(ReserveOutcome {
            reserved,
            shortfall: requested - reserved,
        })
    }

    /// Actor-facing reservation: gate-checks reserve-pool draws, then holds
    /// `min(requested, available)`.
    ///
    /// # Errors
    ///
    /// [`InventoryError::ReserveAuthorizationDenied`] before any ledger
    /// mutation when a non-custodian targets the reserve pool.
    pub fn reserve_line(
        &self,
        actor: Actor,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        requested: Decimal,
    ) -> Result<ReserveOutcome, InventoryError> {
        if pool == Pool::Reserve {
            authorize_reserve(actor.role, ReserveOp::Reserve)?;
        }
        self.hold(item, warehouse, pool, requested)
    }

    /// Actor-facing release of a soft hold; gate-checks reserve-pool
    /// releases. Returns the amount actually released (clamped by the
    /// ledger).
    pub fn release_line(
        &self,
        actor: Actor,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        quantity: Decimal,
    ) -> Result<Decimal, InventoryError> {
        if pool == Pool::Reserve {
            authorize_reserve(actor.role, ReserveOp::Release)?;
        }
        self.ledger.release(item, warehouse, pool, quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::base::ActorId;
    use rust_decimal_macros::dec;

    const ITEM: ItemId = ItemId(1);
    const WAREHOUSE: WarehouseId = WarehouseId(1);

    fn engine_with_stock(general: Decimal, reserve: Decimal) -> (Arc<Ledger>, ReservationEngine) {
        let ledger = Arc::new(Ledger::new());
        if general > Decimal::ZERO {
            ledger
                .credit(ITEM, WAREHOUSE, Pool::General, general, ActorId(0), None)
                .unwrap();
        }
        if reserve > Decimal::ZERO {
            ledger
                .credit(ITEM, WAREHOUSE, Pool::Reserve, reserve, ActorId(0), None)
                .unwrap();
        }
        let engine = ReservationEngine::new(Arc::clone(&ledger));
        (ledger, engine)
    }

    fn storekeeper() -> Actor {
        Actor::new(ActorId(2), Role::Storekeeper)
    }

    fn commander() -> Actor {
        Actor::new(ActorId(3), Role::FactoryCommander)
    }

    #[test]
    fn full_reservation_has_no_shortfall() {
        let (ledger, engine) = engine_with_stock(dec!(100), dec!(0));
        let outcome = engine
            .reserve_line(storekeeper(), ITEM, WAREHOUSE, Pool::General, dec!(40))
            .unwrap();
        assert_eq!(outcome.reserved, dec!(40));
        assert_eq!(outcome.shortfall, Decimal::ZERO);
        assert_eq!(
            ledger.available(ITEM, WAREHOUSE, Pool::General).unwrap(),
            dec!(60)
        );
    }

    #[test]
    fn partial_reservation_reports_shortfall() {
        let (ledger, engine) = engine_with_stock(dec!(60), dec!(0));
        let outcome = engine
            .reserve_line(storekeeper(), ITEM, WAREHOUSE, Pool::General, dec!(100))
            .unwrap();
        assert_eq!(outcome.reserved, dec!(60));
        assert_eq!(outcome.shortfall, dec!(40));
        assert_eq!(
            ledger.available(ITEM, WAREHOUSE, Pool::General).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn empty_pool_reserves_nothing() {
        let (_ledger, engine) = engine_with_stock(dec!(10), dec!(0));
        // Drain availability first.
        engine
            .hold(ITEM, WAREHOUSE, Pool::General, dec!(10))
            .unwrap();
        let outcome = engine
            .hold(ITEM, WAREHOUSE, Pool::General, dec!(25))
            .unwrap();
        assert_eq!(outcome.reserved, Decimal::ZERO);
        assert_eq!(outcome.shortfall, dec!(25));
    }

    #[test]
    fn reserve_pool_denied_for_non_custodian_without_mutation() {
        let (ledger, engine) = engine_with_stock(dec!(0), dec!(50));
        let result = engine.reserve_line(storekeeper(), ITEM, WAREHOUSE, Pool::Reserve, dec!(10));
        assert_eq!(
            result,
            Err(InventoryError::ReserveAuthorizationDenied {
                role: Role::Storekeeper,
                operation: ReserveOp::Reserve,
            })
        );
        // Pool untouched.
        assert_eq!(
            ledger.available(ITEM, WAREHOUSE, Pool::Reserve).unwrap(),
            dec!(50)
        );
    }

    #[test]
    fn commander_reserves_from_reserve_pool() {
        let (_ledger, engine) = engine_with_stock(dec!(0), dec!(50));
        let outcome = engine
            .reserve_line(commander(), ITEM, WAREHOUSE, Pool::Reserve, dec!(30))
            .unwrap();
        assert_eq!(outcome.reserved, dec!(30));
    }

    #[test]
    fn release_of_reserve_hold_is_gated() {
        let (_ledger, engine) = engine_with_stock(dec!(0), dec!(50));
        engine
            .reserve_line(commander(), ITEM, WAREHOUSE, Pool::Reserve, dec!(30))
            .unwrap();
        let denied = engine.release_line(storekeeper(), ITEM, WAREHOUSE, Pool::Reserve, dec!(30));
        assert!(matches!(
            denied,
            Err(InventoryError::ReserveAuthorizationDenied { .. })
        ));
        let released = engine
            .release_line(commander(), ITEM, WAREHOUSE, Pool::Reserve, dec!(30))
            .unwrap();
        assert_eq!(released, dec!(30));
    }

    #[test]
    fn general_pool_release_needs_no_gate() {
        let (_ledger, engine) = engine_with_stock(dec!(20), dec!(0));
        engine
            .hold(ITEM, WAREHOUSE, Pool::General, dec!(15))
            .unwrap();
        let released = engine
            .release_line(storekeeper(), ITEM, WAREHOUSE, Pool::General, dec!(15))
            .unwrap();
        assert_eq!(released, dec!(15));
    }
}
