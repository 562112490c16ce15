//! Small helpers shared by adapters.

pub mod input;
