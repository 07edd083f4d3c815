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

//! Benchmarks for the inventory ledger and workflow engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded ledger mutations
//! - Multi-threaded reservation contention
//! - Full request workflow cycles
//! - Scaling with number of records

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use depot_ledger::{
    Actor, ActorId, ItemId, Ledger, LineAmount, LineItem, Pool, RequestKind, Role, WarehouseId,
    WorkflowEngine,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const WAREHOUSE: WarehouseId = WarehouseId(1);
const ACTOR: ActorId = ActorId(1);

fn seeded_ledger(items: u32, quantity: i64) -> Ledger {
    let ledger = Ledger::new();
    for item in 0..items {
        ledger
            .credit(
                ItemId(item),
                WAREHOUSE,
                Pool::General,
                Decimal::from(quantity),
                ACTOR,
                None,
            )
            .unwrap();
    }
    ledger
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_credit(c: &mut Criterion) {
    c.bench_function("single_credit", |b| {
        b.iter(|| {
            let ledger = Ledger::new();
            ledger
                .credit(
                    black_box(ItemId(1)),
                    WAREHOUSE,
                    Pool::General,
                    Decimal::from(100),
                    ACTOR,
                    None,
                )
                .unwrap();
        })
    });
}

fn bench_reserve_commit_cycle(c: &mut Criterion) {
    c.bench_function("reserve_commit_cycle", |b| {
        let ledger = seeded_ledger(1, i64::MAX / 2);
        b.iter(|| {
            ledger
                .reserve(ItemId(0), WAREHOUSE, Pool::General, Decimal::ONE)
                .unwrap();
            ledger
                .commit(ItemId(0), WAREHOUSE, Pool::General, Decimal::ONE, ACTOR, None)
                .unwrap();
        })
    });
}

fn bench_credit_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("credit_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = Ledger::new();
                for i in 0..count {
                    ledger
                        .credit(
                            ItemId(i as u32 % 100),
                            WAREHOUSE,
                            Pool::General,
                            Decimal::ONE,
                            ACTOR,
                            None,
                        )
                        .unwrap();
                }
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_history_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_query");

    for entries in [100, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(entries),
            entries,
            |b, &entries| {
                let ledger = Ledger::new();
                for i in 0..entries {
                    ledger
                        .credit(
                            ItemId(i as u32 % 50),
                            WAREHOUSE,
                            Pool::General,
                            Decimal::ONE,
                            ACTOR,
                            None,
                        )
                        .unwrap();
                }
                let filter = depot_ledger::JournalFilter {
                    item: Some(ItemId(7)),
                    ..Default::default()
                };
                b.iter(|| black_box(ledger.history(&filter)))
            },
        );
    }
    group.finish();
}

// =============================================================================
// Workflow Benchmarks
// =============================================================================

fn bench_full_requisition_cycle(c: &mut Criterion) {
    c.bench_function("full_requisition_cycle", |b| {
        let ledger = Arc::new(seeded_ledger(1, i64::MAX / 2));
        let engine = WorkflowEngine::new(Arc::clone(&ledger));
        let requester = Actor::new(ActorId(10), Role::Worker);
        let approver = Actor::new(ActorId(20), Role::DepartmentHead);
        let storekeeper = Actor::new(ActorId(11), Role::Storekeeper);

        b.iter(|| {
            let draft = engine
                .create(
                    RequestKind::Requisition,
                    requester,
                    vec![LineItem::new(ItemId(0), WAREHOUSE, Decimal::from(10))],
                )
                .unwrap();
            engine.submit(draft.id, None).unwrap();
            engine.approve(draft.id, approver, &[], None).unwrap();
            engine
                .issue(
                    draft.id,
                    storekeeper,
                    &[LineAmount { line: 0, quantity: Decimal::from(10) }],
                    None,
                )
                .unwrap();
            black_box(draft.id);
        })
    });
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_reserves_same_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_reserves_same_record");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = Arc::new(seeded_ledger(1, i64::MAX / 2));
                (0..count).into_par_iter().for_each(|_| {
                    ledger
                        .reserve(ItemId(0), WAREHOUSE, Pool::General, Decimal::ONE)
                        .unwrap();
                });
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_parallel_credits_different_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_credits_different_records");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = Arc::new(Ledger::new());
                (0..count).into_par_iter().for_each(|i| {
                    ledger
                        .credit(
                            ItemId((i % 1_000) as u32),
                            WAREHOUSE,
                            Pool::General,
                            Decimal::ONE,
                            ACTOR,
                            None,
                        )
                        .unwrap();
                });
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_record_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_contention");
    let total_ops = 10_000u32;

    // Fewer records means more threads competing for the same mutex.
    for num_records in [1, 10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("records", num_records),
            num_records,
            |b, &num_records| {
                b.iter(|| {
                    let ledger = Arc::new(Ledger::new());
                    (0..total_ops).into_par_iter().for_each(|i| {
                        ledger
                            .credit(
                                ItemId(i % num_records as u32),
                                WAREHOUSE,
                                Pool::General,
                                Decimal::ONE,
                                ACTOR,
                                None,
                            )
                            .unwrap();
                    });
                    black_box(&ledger);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    single_threaded,
    bench_single_credit,
    bench_reserve_commit_cycle,
    bench_credit_throughput,
    bench_history_query,
);

criterion_group!(workflow, bench_full_requisition_cycle,);

criterion_group!(
    multi_threaded,
    bench_parallel_reserves_same_record,
    bench_parallel_credits_different_records,
    bench_record_contention,
);

criterion_main!(single_threaded, workflow, multi_threaded);
