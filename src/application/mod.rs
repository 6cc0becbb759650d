//! Application services layer.

pub mod categories;
pub mod collaborators;
pub mod error;
pub mod listings;
pub mod monetization;
pub mod payments;
pub mod repos;
pub mod webhook;
