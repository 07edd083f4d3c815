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

//! Append-only transaction log.
//!
//! Every committed quantity mutation (adjust, commit, credit) writes exactly
//! one [`JournalEntry`] carrying both pools' quantities before and after, so
//! the ledger can be reconstructed and audited. Reservations and releases
//! touch allocations only and are not journaled.
//!
//! Entries are immutable once appended; retention is an external concern.

use crate::base::{ActorId, EntryId, ItemId, RequestId, WarehouseId};
use crate::record::Pool;
use crate::request::RequestKind;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The workflow request a mutation originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub request: RequestId,
    pub kind: RequestKind,
}

/// Immutable record of one committed quantity mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub item: ItemId,
    pub warehouse: WarehouseId,
    /// Pool the operation targeted; `None` for an adjustment that touched both.
    pub pool: Option<Pool>,
    /// Signed net quantity change (negative when stock left the warehouse).
    pub delta: Decimal,
    pub general_before: Decimal,
    pub general_after: Decimal,
    pub reserve_before: Decimal,
    pub reserve_after: Decimal,
    pub origin: Option<Origin>,
    pub actor: ActorId,
    /// Free-text reason for manual adjustments.
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Filter for journal history queries. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalFilter {
    pub item: Option<ItemId>,
    pub warehouse: Option<WarehouseId>,
    pub request: Option<RequestId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl JournalFilter {
    fn matches(&self, entry: &JournalEntry) -> bool {
        if self.item.is_some_and(|item| item != entry.item) {
            return false;
        }
        if self.warehouse.is_some_and(|wh| wh != entry.warehouse) {
            return false;
        }
        if self
            .request
            .is_some_and(|id| entry.origin.map(|o| o.request) != Some(id))
        {
            return false;
        }
        if self.from.is_some_and(|from| entry.recorded_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.recorded_at > to) {
            return false;
        }
        true
    }
}

/// Thread-safe append-only log with monotonic entry ids.
///
/// Writers append under a short write lock; history queries take a read lock
/// and filter, preserving append order.
#[derive(Debug, Default)]
pub struct TransactionLog {
    entries: RwLock<Vec<Arc<JournalEntry>>>,
    next_id: AtomicU64,
}

/// Everything needed to journal one mutation, minus the id and timestamp the
/// log itself assigns.
pub(crate) struct Mutation {
    pub item: ItemId,
    pub warehouse: WarehouseId,
    pub pool: Option<Pool>,
    pub delta: Decimal,
    pub general_before: Decimal,
    pub general_after: Decimal,
    pub reserve_before: Decimal,
    pub reserve_after: Decimal,
    pub origin: Option<Origin>,
    pub actor: ActorId,
    pub reason: Option<String>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&self, mutation: Mutation) -> Arc<JournalEntry> {
        let id = EntryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(JournalEntry {
            id,
            item: mutation.item,
            warehouse: mutation.warehouse,
            pool: mutation.pool,
            delta: mutation.delta,
            general_before: mutation.general_before,
            general_after: mutation.general_after,
            reserve_before: mutation.reserve_before,
            reserve_after: mutation.reserve_after,
            origin: mutation.origin,
            actor: mutation.actor,
            reason: mutation.reason,
            recorded_at: Utc::now(),
        });
        self.entries.write().push(Arc::clone(&entry));
        entry
    }

    /// Entries matching the filter, in append order.
    pub fn history(&self, filter: &JournalFilter) -> Vec<Arc<JournalEntry>> {
        self.entries
            .read()
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
