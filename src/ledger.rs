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

//! The inventory ledger: single source of truth for stock quantities.
//!
//! The ledger owns one [`InventoryRecord`] per (item, warehouse) pair inside a
//! [`DashMap`], so operations on different pairs proceed fully in parallel
//! while each record's own mutex serializes its read-modify-write cycles.
//!
//! Quantity mutations (adjust, commit, credit) journal exactly one
//! [`JournalEntry`](crate::JournalEntry) with before/after snapshots of both
//! pools. Reservations and releases only move the allocation counters and are
//! not journaled.

use crate::base::{ActorId, ItemId, StockKey, WarehouseId};
use crate::error::InventoryError;
use crate::journal::{JournalEntry, JournalFilter, Mutation, Origin, TransactionLog};
use crate::record::{InventoryRecord, Pool, RecordSnapshot, StockStatus};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Aggregated stock position of one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseSummary {
    pub warehouse: WarehouseId,
    pub records: usize,
    pub total_general: Decimal,
    pub total_reserve: Decimal,
    pub low: usize,
    pub critical: usize,
    pub reserve_deficient: usize,
}

/// Concurrent dual-pool stock ledger.
pub struct Ledger {
    records: DashMap<StockKey, InventoryRecord>,
    journal: TransactionLog,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            journal: TransactionLog::new(),
        }
    }

    /// Current state of one record, or `None` when no stock was ever received
    /// for the pair.
    pub fn get(&self, item: ItemId, warehouse: WarehouseId) -> Option<RecordSnapshot> {
        self.records
            .get(&(item, warehouse))
            .map(|record| record.snapshot())
    }

    /// Available-to-promise for a pool.
    pub fn available(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
    ) -> Result<Decimal, InventoryError> {
        let record = self
            .records
            .get(&(item, warehouse))
            .ok_or(InventoryError::RecordNotFound)?;
        Ok(record.available(pool))
    }

    /// Sets the reorder point and minimum required reserve for a record.
    pub fn set_thresholds(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        reorder_point: Decimal,
        minimum_reserve: Decimal,
    ) -> Result<RecordSnapshot, InventoryError> {
        let record = self
            .records
            .get(&(item, warehouse))
            .ok_or(InventoryError::RecordNotFound)?;
        let mut data = record.lock();
        data.set_thresholds(reorder_point, minimum_reserve);
        Ok(RecordSnapshot::from_data(&data))
    }

    /// Applies signed deltas to both pools under one lock, journaling one
    /// entry. Fails with [`InventoryError::InvariantViolation`] (nothing
    /// applied) if a quantity would go negative or undercut its allocation.
    pub fn adjust(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        general_delta: Decimal,
        reserve_delta: Decimal,
        reason: &str,
        actor: ActorId,
    ) -> Result<RecordSnapshot, InventoryError> {
        let record = self
            .records
            .get(&(item, warehouse))
            .ok_or(InventoryError::RecordNotFound)?;
        let mut data = record.lock();
        let before = RecordSnapshot::from_data(&data);
        data.adjust(general_delta, reserve_delta)?;
        let after = RecordSnapshot::from_data(&data);
        let pool = match (
            general_delta != Decimal::ZERO,
            reserve_delta != Decimal::ZERO,
        ) {
            (true, false) => Some(Pool::General),
            (false, true) => Some(Pool::Reserve),
            _ => None,
        };
        self.journal.append(Mutation {
            item,
            warehouse,
            pool,
            delta: general_delta + reserve_delta,
            general_before: before.general_quantity,
            general_after: after.general_quantity,
            reserve_before: before.reserve_quantity,
            reserve_after: after.reserve_quantity,
            origin: None,
            actor,
            reason: Some(reason.to_string()),
        });
        Ok(after)
    }

    /// Soft-holds `quantity` against the pool. Fails without side effect when
    /// the pool cannot cover it. Not journaled.
    pub fn reserve(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        quantity: Decimal,
    ) -> Result<(), InventoryError> {
        let record = self
            .records
            .get(&(item, warehouse))
            .ok_or(InventoryError::RecordNotFound)?;
        let mut data = record.lock();
        data.reserve(pool, quantity)
    }

    /// Reserves up to `quantity` from the pool in one atomic step, clamping
    /// to current availability under the record's lock. Returns the amount
    /// actually held; zero is a valid outcome. Not journaled.
    pub fn reserve_up_to(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        quantity: Decimal,
    ) -> Result<Decimal, InventoryError> {
        let record = self
            .records
            .get(&(item, warehouse))
            .ok_or(InventoryError::RecordNotFound)?;
        let mut data = record.lock();
        data.reserve_up_to(pool, quantity)
    }

    /// Releases a soft hold, clamping at zero. Returns the amount actually
    /// released; an over-release is logged since correct callers never ask
    /// for more than they hold.
    pub fn release(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        quantity: Decimal,
    ) -> Result<Decimal, InventoryError> {
        if quantity <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        let record = self
            .records
            .get(&(item, warehouse))
            .ok_or(InventoryError::RecordNotFound)?;
        let mut data = record.lock();
        let released = data.release(pool, quantity);
        if released < quantity {
            warn!(
                %item, %warehouse, %pool, asked = %quantity, %released,
                "release clamped to current allocation"
            );
        }
        Ok(released)
    }

    /// Converts a reservation into a permanent decrease of the pool: quantity
    /// and allocation both drop, stock leaves the warehouse. Journals one
    /// entry with a negative delta.
    pub fn commit(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        quantity: Decimal,
        actor: ActorId,
        origin: Option<Origin>,
    ) -> Result<RecordSnapshot, InventoryError> {
        let record = self
            .records
            .get(&(item, warehouse))
            .ok_or(InventoryError::RecordNotFound)?;
        let mut data = record.lock();
        let before = RecordSnapshot::from_data(&data);
        data.commit(pool, quantity)?;
        let after = RecordSnapshot::from_data(&data);
        self.journal.append(Mutation {
            item,
            warehouse,
            pool: Some(pool),
            delta: -quantity,
            general_before: before.general_quantity,
            general_after: after.general_quantity,
            reserve_before: before.reserve_quantity,
            reserve_after: after.reserve_quantity,
            origin,
            actor,
            reason: None,
        });
        Ok(after)
    }

    /// Raises the pool quantity (receipts, returns, reserve restock),
    /// creating the record on the first receipt for the pair. Journals one
    /// entry with a positive delta.
    pub fn credit(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
        pool: Pool,
        quantity: Decimal,
        actor: ActorId,
        origin: Option<Origin>,
    ) -> Result<RecordSnapshot, InventoryError> {
        if quantity <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity);
        }
        let record = self
            .records
            .entry((item, warehouse))
            .or_insert_with(|| InventoryRecord::new(item, warehouse));
        let mut data = record.lock();
        let before = RecordSnapshot::from_data(&data);
        data.credit(pool, quantity)?;
        let after = RecordSnapshot::from_data(&data);
        self.journal.append(Mutation {
            item,
            warehouse,
            pool: Some(pool),
            delta: quantity,
            general_before: before.general_quantity,
            general_after: after.general_quantity,
            reserve_before: before.reserve_quantity,
            reserve_after: after.reserve_quantity,
            origin,
            actor,
            reason: None,
        });
        Ok(after)
    }

    /// Snapshots of every record, unordered.
    pub fn snapshots(&self) -> Vec<RecordSnapshot> {
        self.records
            .iter()
            .map(|record| record.snapshot())
            .collect()
    }

    /// Aggregate stock position of one warehouse.
    pub fn warehouse_summary(&self, warehouse: WarehouseId) -> WarehouseSummary {
        let mut summary = WarehouseSummary {
            warehouse,
            records: 0,
            total_general: Decimal::ZERO,
            total_reserve: Decimal::ZERO,
            low: 0,
            critical: 0,
            reserve_deficient: 0,
        };
        for record in self.records.iter() {
            let snapshot = record.snapshot();
            if snapshot.warehouse != warehouse {
                continue;
            }
            summary.records += 1;
            summary.total_general += snapshot.general_quantity;
            summary.total_reserve += snapshot.reserve_quantity;
            match snapshot.status {
                StockStatus::Low => summary.low += 1,
                StockStatus::Critical => summary.critical += 1,
                StockStatus::Ok => {}
            }
            if snapshot.reserve_deficient {
                summary.reserve_deficient += 1;
            }
        }
        summary
    }

    /// Journal entries matching the filter, in append order.
    pub fn history(&self, filter: &JournalFilter) -> Vec<Arc<JournalEntry>> {
        self.journal.history(filter)
    }

    pub fn journal(&self) -> &TransactionLog {
        &self.journal
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
