//! hookdeck-deploy-lib: Manifest resolution and deployment for Hookdeck
//!
//! This crate provides the building blocks of the `hookdeck-deploy` tool:
//! - `manifest`: JSONC manifests, inheritance, environment overlays, interpolation
//! - `pipeline`: the full load-and-resolve sequence for one manifest
//! - `project`: many manifests under one project file, with cross-file validation
//! - `deploy`: dependency-ordered upserts against the Hookdeck API
//! - `drift` / `status`: comparison of local declarations with remote state

pub mod api;
pub mod credentials;
pub mod deploy;
pub mod drift;
pub mod manifest;
pub mod pipeline;
pub mod project;
pub mod schema;
pub mod status;
pub mod util;
pub mod wrangler;
