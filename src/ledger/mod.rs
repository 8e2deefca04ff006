//! Local collateral custody
//!
//! - `CollateralToken` is the transfer primitive the pool holds custody through
//! - `CollateralLedger` tracks how much of that custody backs each series

mod collateral;
mod token;

pub use collateral::CollateralLedger;
pub use token::{CollateralToken, InMemoryToken};
