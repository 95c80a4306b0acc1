//! JSON schemas for editor completion of manifest and project files.

pub const MANIFEST_SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas/manifest.schema.json"));
pub const PROJECT_SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas/project.schema.json"));
