//! Pure claim, nation and war logic. No I/O: the plugin crate loads state
//! from the database, drives these registries and writes back the results.

pub mod dust;
pub mod error;
pub mod nations;
pub mod rebalance;
pub mod registry;
pub mod wars;

pub use dust::{ChatColor, DustEffect, Rgb, border_points, rainbow};
pub use error::{ClaimError, NationError, WarError};
pub use nations::{AllianceOutcome, Disbanded, NationRegistry, NationRules};
pub use rebalance::{Allocation, ClaimUsage, RebalanceReport, rebalance};
pub use registry::{ChunkClaimed, ClaimRegistry, ClaimRules, DeficitRepair, Migration};
pub use wars::{AcceptedTribute, Declaration, WarOutcome, WarRegistry, WarRules};
