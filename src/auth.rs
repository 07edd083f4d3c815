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

//! Reserve authorization gate.
//!
//! The commander's reserve pool is gated behind an elevated role check that is
//! independent of the workflow's own approval step: a department head can
//! approve a request's general-pool lines while its reserve lines wait for a
//! commander's sign-off.

use crate::base::ActorId;
use crate::error::InventoryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Actor roles as resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Worker,
    Storekeeper,
    DepartmentHead,
    FactoryCommander,
    ComplexCommander,
}

impl Role {
    /// Whether this role may reserve or release commander's-reserve stock.
    pub fn is_reserve_custodian(&self) -> bool {
        matches!(self, Role::FactoryCommander | Role::ComplexCommander)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Worker => "worker",
            Role::Storekeeper => "storekeeper",
            Role::DepartmentHead => "department head",
            Role::FactoryCommander => "factory commander",
            Role::ComplexCommander => "complex commander",
        };
        write!(f, "{name}")
    }
}

/// Gated operations against the reserve pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveOp {
    Reserve,
    Release,
}

impl fmt::Display for ReserveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReserveOp::Reserve => write!(f, "reserve"),
            ReserveOp::Release => write!(f, "release"),
        }
    }
}

/// An identified actor with a resolved role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ActorId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Pure policy check for reserve-pool operations.
///
/// # Errors
///
/// [`InventoryError::ReserveAuthorizationDenied`] when the role is not a
/// reserve custodian. The denial names the operation and the actor's role so
/// the caller can surface "ask commander" rather than a generic failure.
pub fn authorize_reserve(role: Role, operation: ReserveOp) -> Result<(), InventoryError> {
    if role.is_reserve_custodian() {
        Ok(())
    } else {
        Err(InventoryError::ReserveAuthorizationDenied { role, operation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commanders_are_custodians() {
        assert!(Role::FactoryCommander.is_reserve_custodian());
        assert!(Role::ComplexCommander.is_reserve_custodian());
    }

    #[test]
    fn ordinary_roles_are_not_custodians() {
        assert!(!Role::Worker.is_reserve_custodian());
        assert!(!Role::Storekeeper.is_reserve_custodian());
        assert!(!Role::DepartmentHead.is_reserve_custodian());
    }

    #[test]
    fn authorize_allows_commander_reserve_and_release() {
        assert!(authorize_reserve(Role::FactoryCommander, ReserveOp::Reserve).is_ok());
        assert!(authorize_reserve(Role::ComplexCommander, ReserveOp::Release).is_ok());
    }

    #[test]
    fn authorize_denies_with_role_and_operation() {
        let result = authorize_reserve(Role::DepartmentHead, ReserveOp::Release);
        assert_eq!(
            result,
            Err(InventoryError::ReserveAuthorizationDenied {
                role: Role::DepartmentHead,
                operation: ReserveOp::Release,
            })
        );
    }
}
