// ABOUTME: Facade crate re-exporting promptforge's domain types and core subsystems
//! The workspace root package. It carries no logic of its own — every
//! subsystem lives in [`promptforge_core`] and [`promptforge_types`] — and
//! exists so the workspace has a single crate name (`promptforge`) to point
//! integration tests and documentation at.

pub use promptforge_core as core;
pub use promptforge_types as types;
