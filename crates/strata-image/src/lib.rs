//! # strata-image
//!
//! Image building and layer management for strata.
//!
//! Handles:
//! - **Manifests**: reading declarative dependency manifests.
//! - **Installers**: the seam to the external package installer.
//! - **Layers**: deterministic, content-addressed filesystem layers.
//! - **Store**: local blob store with an explicit build cache.
//! - **Sources**: `file://`, `tar://`, and `https://` base image protocols.
//! - **Build**: the fixed five-layer build pipeline.
//! - **Catalog**: local image catalog management.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod build;
pub mod catalog;
pub mod hash;
pub mod installer;
pub mod layer;
pub mod manifest;
pub mod source;
pub mod store;
