// The infra module contains implementations of core traits.
// Each external service gets its own submodule.

#[path = "google_auth/mod.rs"]
pub mod google_auth;

#[path = "sheets/mod.rs"]
pub mod sheets;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "gmail/mod.rs"]
pub mod gmail;

#[path = "logging/mod.rs"]
pub mod logging;
