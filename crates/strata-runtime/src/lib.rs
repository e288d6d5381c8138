//! # strata-runtime
//!
//! Service lifecycle management for strata: assembling a rootfs from
//! stored layers, launching exactly one server process per service,
//! tracking state in a local JSON index, and capturing process logs.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod logs;
pub mod process;
pub mod rootfs;
pub mod state;
