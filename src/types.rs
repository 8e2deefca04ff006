//! Shared identifier types

use alloy_primitives::B256;

/// Domain (chain) identifier
pub type ChainId = u64;

/// Option series identifier
pub type SeriesId = B256;

/// Derived cross-chain message identity
pub type MessageId = B256;
