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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use depot_ledger::{ActorId, ItemId, Ledger, Pool, WarehouseId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Depot Ledger - Replay stock movement CSV files
///
/// Reads stock movements from a CSV file and outputs per-record inventory
/// snapshots to stdout. Supports receipts, adjustments, issues, and returns.
#[derive(Parser, Debug)]
#[command(name = "depot-ledger")]
#[command(about = "A warehouse inventory engine that replays stock movement CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with stock movements
    ///
    /// Expected format: op,item,warehouse,pool,quantity,reason
    /// Example: cargo run -- movements.csv > inventory.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

/// Movements are attributed to the replay actor.
const REPLAY_ACTOR: ActorId = ActorId(0);

fn main() {
    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let ledger = match process_movements(BufReader::new(file)) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Error processing movements: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_inventory(&ledger, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, item, warehouse, pool, quantity, reason`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    item: u32,
    warehouse: u16,
    pool: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    quantity: Option<Decimal>,
    reason: Option<String>,
}

enum Movement {
    Receipt { pool: Pool, quantity: Decimal },
    Adjust { pool: Pool, delta: Decimal, reason: String },
    Issue { pool: Pool, quantity: Decimal },
    Return { pool: Pool, quantity: Decimal },
}

impl CsvRecord {
    /// Converts a CSV record to a movement.
    ///
    /// Returns `None` for unknown ops, unknown pools, or a missing quantity.
    fn into_movement(self) -> Option<(ItemId, WarehouseId, Movement)> {
        let item = ItemId(self.item);
        let warehouse = WarehouseId(self.warehouse);
        let pool = match self.pool.as_deref().unwrap_or("general") {
            "general" | "" => Pool::General,
            "reserve" => Pool::Reserve,
            _ => return None,
        };
        let quantity = self.quantity?;

        let movement = match self.op.to_lowercase().as_str() {
            "receipt" => Movement::Receipt { pool, quantity },
            "adjust" => Movement::Adjust {
                pool,
                delta: quantity,
                reason: self.reason.unwrap_or_else(|| "manual adjustment".to_string()),
            },
            "issue" => Movement::Issue { pool, quantity },
            "return" => Movement::Return { pool, quantity },
            _ => return None,
        };
        Some((item, warehouse, movement))
    }
}

/// Replay stock movements from a CSV reader into a fresh ledger.
///
/// Uses streaming parsing so arbitrarily large files never load fully into
/// memory. Malformed rows and movements the ledger rejects (unknown record,
/// insufficient stock, invariant violations) are skipped.
///
/// # CSV Format
///
/// Expected columns: `op, item, warehouse, pool, quantity, reason`
/// - `op`: receipt, adjust, issue, or return
/// - `pool`: general (default) or reserve
/// - `quantity`: positive for receipt/issue/return; signed delta for adjust
/// - `reason`: free text, recorded for adjustments
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_movements<R: Read>(reader: R) -> Result<Ledger, csv::Error> {
    let ledger = Ledger::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // Allow missing trailing reason field
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some((item, warehouse, movement)) = record.into_movement() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid movement record");
                    continue;
                };
                if let Err(_e) = apply_movement(&ledger, item, warehouse, movement) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping movement for item {}: {}", item, _e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(ledger)
}

fn apply_movement(
    ledger: &Ledger,
    item: ItemId,
    warehouse: WarehouseId,
    movement: Movement,
) -> Result<(), depot_ledger::InventoryError> {
    match movement {
        Movement::Receipt { pool, quantity } | Movement::Return { pool, quantity } => {
            ledger.credit(item, warehouse, pool, quantity, REPLAY_ACTOR, None)?;
        }
        Movement::Adjust { pool, delta, reason } => {
            let (general, reserve) = match pool {
                Pool::General => (delta, Decimal::ZERO),
                Pool::Reserve => (Decimal::ZERO, delta),
            };
            ledger.adjust(item, warehouse, general, reserve, &reason, REPLAY_ACTOR)?;
        }
        Movement::Issue { pool, quantity } => {
            // A direct issue is a reserve-then-commit in one step.
            ledger.reserve(item, warehouse, pool, quantity)?;
            ledger.commit(item, warehouse, pool, quantity, REPLAY_ACTOR, None)?;
        }
    }
    Ok(())
}

/// Write inventory snapshots to a CSV writer, sorted by item and warehouse.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_inventory<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut snapshots = ledger.snapshots();
    snapshots.sort_by_key(|snapshot| (snapshot.item, snapshot.warehouse));
    for snapshot in snapshots {
        wtr.serialize(&snapshot)?;
    }

    wtr.flush()?;
    Ok(())
}
