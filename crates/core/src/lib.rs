//! Easel Core Library
//!
//! Room model, participant directory, shared session artifacts, lifecycle
//! rules, the permission gate and the registry of live rooms.

pub mod error;
pub mod invariants;
pub mod lifecycle;
pub mod limits;
pub mod models;
pub mod permissions;
pub mod registry;

pub use error::{Error, Result};
pub use lifecycle::{EventClass, LifecycleState};
pub use models::*;
pub use permissions::*;
pub use registry::{RoomHandle, RoomRegistry};
