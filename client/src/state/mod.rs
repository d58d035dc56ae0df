//! Per-view state models owned by the view actor.

pub mod presence;
pub mod resolver;
pub mod selection;
pub mod viewport;
