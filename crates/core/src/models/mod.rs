//! Data models for Easel rooms

mod artifacts;
mod participant;
mod room;

pub use artifacts::*;
pub use participant::*;
pub use room::*;
