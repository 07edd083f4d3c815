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

//! Per (item, warehouse) inventory state.
//!
//! Each record holds two co-existing pools:
//!
//! - **general** stock, available to ordinary requests, and
//! - the **commander's reserve**, gated behind elevated authorization.
//!
//! Every pool carries its own soft-allocation counter. Invariants that must
//! hold after every mutation:
//!
//! - `0 <= general_allocated <= general_quantity`
//! - `0 <= reserve_allocated <= reserve_quantity`
//!
//! `total_quantity` is always derived as `general + reserve`, never stored.
//!
//! # Example
//!
//! ```
//! use depot_ledger::{InventoryRecord, ItemId, WarehouseId};
//! use rust_decimal_macros::dec;
//!
//! let record = InventoryRecord::new(ItemId(1), WarehouseId(1));
//! assert_eq!(record.snapshot().total_quantity, dec!(0));
//! ```

use crate::base::{ItemId, WarehouseId};
use crate::error::InventoryError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two stock pools of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pool {
    General,
    Reserve,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pool::General => write!(f, "general"),
            Pool::Reserve => write!(f, "reserve"),
        }
    }
}

/// Derived stock health, computed from the general pool against the reorder
/// point. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    Ok,
    Low,
    Critical,
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockStatus::Ok => write!(f, "ok"),
            StockStatus::Low => write!(f, "low"),
            StockStatus::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct RecordData {
    item: ItemId,
    warehouse: WarehouseId,
    general_quantity: Decimal,
    reserve_quantity: Decimal,
    general_allocated: Decimal,
    reserve_allocated: Decimal,
    minimum_reserve_required: Decimal,
    reorder_point: Decimal,
    version: u64,
    last_updated: DateTime<Utc>,
}

impl RecordData {
    fn new(item: ItemId, warehouse: WarehouseId) -> Self {
        Self {
            item,
            warehouse,
            general_quantity: Decimal::ZERO,
            reserve_quantity: Decimal::ZERO,
            general_allocated: Decimal::ZERO,
            reserve_allocated: Decimal::ZERO,
            minimum_reserve_required: Decimal::ZERO,
            reorder_point: Decimal::ZERO,
            version: 0,
            last_updated: Utc::now(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.general_allocated >= Decimal::ZERO
                && self.general_allocated <= self.general_quantity,
            "Invariant violated: general allocation {} outside [0, {}]",
            self.general_allocated,
            self.general_quantity
        );
        debug_assert!(
            self.reserve_allocated >= Decimal::ZERO
                && self.reserve_allocated <= self.reserve_quantity,
            "Invariant violated: reserve allocation {} outside [0, {}]",
            self.reserve_allocated,
            self.reserve_quantity
        );
    }

    fn touch(&mut self) {
        self.version += 1;
        self.last_updated = Utc::now();
    }

    pub(crate) fn quantity(&self, pool: Pool) -> Decimal {
        match pool {
            Pool::General => self.general_quantity,
            Pool::Reserve => self.reserve_quantity,
        }
    }

    pub(crate) fn allocated(&self, pool: Pool) -> Decimal {
        match pool {
            Pool::General => self.general_allocated,
            Pool::Reserve => self.reserve_allocated,
        }
    }

    /// Available-to-promise for a pool: quantity minus soft allocation.
    pub(crate) fn available(&self, pool: Pool) -> Decimal {
        self.quantity(pool) - self.allocated(pool)
    }

    /// Raises the pool's allocation by `quantity`.
    ///
    /// Fails without side effect when the pool cannot cover it.
    pub(crate) fn reserve(&mut self, pool: Pool, quantity: Decimal) -> Result<(), InventoryError> {
        if quantity <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        let available = self.available(pool);
        if available < quantity {
            return Err(InventoryError::InsufficientAvailable { available });
        }
        match pool {
            Pool::General => self.general_allocated += quantity,
            Pool::Reserve => self.reserve_allocated += quantity,
        }
        self.touch();
        self.assert_invariants();
        Ok(())
    }

    /// Raises the pool's allocation by up to `requested`, clamped to what the
    /// pool can cover. The availability read and the raise happen under the
    /// same borrow, so a concurrent reservation can shrink the amount taken
    /// but never turn a partial hold into a failure.
    ///
    /// Returns the amount actually reserved; zero when the pool is exhausted.
    pub(crate) fn reserve_up_to(
        &mut self,
        pool: Pool,
        requested: Decimal,
    ) -> Result<Decimal, InventoryError> {
        if requested <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        let take = requested.min(self.available(pool));
        if take > Decimal::ZERO {
            match pool {
                Pool::General => self.general_allocated += take,
                Pool::Reserve => self.reserve_allocated += take,
            }
            self.touch();
        }
        self.assert_invariants();
        Ok(take)
    }

    /// Lowers the pool's allocation, clamping at zero.
    ///
    /// Returns the amount actually released; the caller logs when the clamp
    /// fired, since a correct caller never over-releases.
    pub(crate) fn release(&mut self, pool: Pool, quantity: Decimal) -> Decimal {
        let released = quantity.min(self.allocated(pool)).max(Decimal::ZERO);
        if released > Decimal::ZERO {
            match pool {
                Pool::General => self.general_allocated -= released,
                Pool::Reserve => self.reserve_allocated -= released,
            }
            self.touch();
        }
        self.assert_invariants();
        released
    }

    /// Converts a reservation into a permanent decrease: quantity and
    /// allocation both drop by `quantity` (stock leaves the warehouse).
    pub(crate) fn commit(&mut self, pool: Pool, quantity: Decimal) -> Result<(), InventoryError> {
        if quantity <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        if self.allocated(pool) < quantity {
            return Err(InventoryError::InvariantViolation(
                "commit exceeds the pool's reserved allocation",
            ));
        }
        match pool {
            Pool::General => {
                self.general_quantity -= quantity;
                self.general_allocated -= quantity;
            }
            Pool::Reserve => {
                self.reserve_quantity -= quantity;
                self.reserve_allocated -= quantity;
            }
        }
        self.touch();
        self.assert_invariants();
        Ok(())
    }

    /// Raises the pool quantity (receipts, returns, reserve restock).
    pub(crate) fn credit(&mut self, pool: Pool, quantity: Decimal) -> Result<(), InventoryError> {
        if quantity <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        match pool {
            Pool::General => self.general_quantity += quantity,
            Pool::Reserve => self.reserve_quantity += quantity,
        }
        self.touch();
        self.assert_invariants();
        Ok(())
    }

    /// Applies signed deltas to both pool quantities at once.
    ///
    /// Fails without side effect when a resulting quantity would go negative
    /// or drop below its pool's current allocation.
    pub(crate) fn adjust(
        &mut self,
        general_delta: Decimal,
        reserve_delta: Decimal,
    ) -> Result<(), InventoryError> {
        if general_delta == Decimal::ZERO && reserve_delta == Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        let new_general = self.general_quantity + general_delta;
        let new_reserve = self.reserve_quantity + reserve_delta;
        if new_general < Decimal::ZERO || new_reserve < Decimal::ZERO {
            return Err(InventoryError::InvariantViolation(
                "adjustment would drive a pool quantity negative",
            ));
        }
        if new_general < self.general_allocated || new_reserve < self.reserve_allocated {
            return Err(InventoryError::InvariantViolation(
                "adjustment would drop a pool below its reserved allocation",
            ));
        }
        self.general_quantity = new_general;
        self.reserve_quantity = new_reserve;
        self.touch();
        self.assert_invariants();
        Ok(())
    }

    pub(crate) fn set_thresholds(&mut self, reorder_point: Decimal, minimum_reserve: Decimal) {
        self.reorder_point = reorder_point;
        self.minimum_reserve_required = minimum_reserve;
        self.touch();
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    fn status(&self) -> StockStatus {
        let available = self.available(Pool::General);
        if available <= Decimal::ZERO {
            StockStatus::Critical
        } else if available <= self.reorder_point {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }
}

/// One item's stock position in one warehouse.
///
/// All mutation goes through the [`Ledger`](crate::Ledger); the mutex makes
/// each read-modify-write of quantities and allocations atomic per record, so
/// no partially applied state is ever observable.
#[derive(Debug)]
pub struct InventoryRecord {
    inner: Mutex<RecordData>,
}

impl InventoryRecord {
    pub fn new(item: ItemId, warehouse: WarehouseId) -> Self {
        Self {
            inner: Mutex::new(RecordData::new(item, warehouse)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RecordData> {
        self.inner.lock()
    }

    /// Available-to-promise for a pool.
    pub fn available(&self, pool: Pool) -> Decimal {
        self.inner.lock().available(pool)
    }

    /// A consistent point-in-time copy of the record, including the derived
    /// status fields.
    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot::from_data(&self.inner.lock())
    }
}

/// Serializable point-in-time copy of an [`InventoryRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub item: ItemId,
    pub warehouse: WarehouseId,
    pub general_quantity: Decimal,
    pub reserve_quantity: Decimal,
    pub total_quantity: Decimal,
    pub general_allocated: Decimal,
    pub reserve_allocated: Decimal,
    pub available_general: Decimal,
    pub available_reserve: Decimal,
    pub reorder_point: Decimal,
    pub minimum_reserve_required: Decimal,
    pub status: StockStatus,
    pub reserve_deficient: bool,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl RecordSnapshot {
    pub(crate) fn from_data(data: &RecordData) -> Self {
        Self {
            item: data.item,
            warehouse: data.warehouse,
            general_quantity: data.general_quantity,
            reserve_quantity: data.reserve_quantity,
            total_quantity: data.general_quantity + data.reserve_quantity,
            general_allocated: data.general_allocated,
            reserve_allocated: data.reserve_allocated,
            available_general: data.available(Pool::General),
            available_reserve: data.available(Pool::Reserve),
            reorder_point: data.reorder_point,
            minimum_reserve_required: data.minimum_reserve_required,
            status: data.status(),
            reserve_deficient: data.reserve_quantity < data.minimum_reserve_required,
            version: data.version,
            last_updated: data.last_updated,
        }
    }
}
