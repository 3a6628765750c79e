// Copyright (c) 2024 Botho Foundation
//
//! Shared constants for engine integration tests.

use zmt::{ledger::Timestamp, Amount};

/// 2024-03-01T00:00:00Z
pub const START: Timestamp = 1_709_251_200;

/// One day in seconds
pub const DAY: u64 = 86_400;

/// Default mining rate (0.000001 ZMT/s)
pub const DEFAULT_RATE: Amount = Amount::from_picos(1_000_000);
