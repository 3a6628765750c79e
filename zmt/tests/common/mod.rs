// Copyright (c) 2024 Botho Foundation
//
//! Common test utilities for engine integration tests.
//!
//! Builds an [`Engine`](zmt::Engine) over a temporary LMDB directory with a
//! manual clock so tests control elapsed time and calendar days.
//!
//! # Example
//!
//! ```ignore
//! use common::{TestEngine, START};
//!
//! let t = TestEngine::new();
//! let alice = t.register("alice");
//! t.clock.advance(60);
//! ```

#![allow(dead_code)]

mod constants;
mod engine;

pub use constants::*;
pub use engine::*;
