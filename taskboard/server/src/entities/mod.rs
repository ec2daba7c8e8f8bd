//! sea-orm entities for the tables created by the `migration` crate.

pub mod participant;
pub mod project;
pub mod task;
pub mod task_participant;
pub mod user;
