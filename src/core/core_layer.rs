// The core module contains all business logic.
// Nothing in here talks to the network: each external collaborator is a trait
// that the infra layer implements.

#[path = "roster/mod.rs"]
pub mod roster;

#[path = "birthdays/mod.rs"]
pub mod birthdays;

#[path = "greetings/mod.rs"]
pub mod greetings;

#[path = "notify/mod.rs"]
pub mod notify;

#[path = "pipeline/mod.rs"]
pub mod pipeline;
