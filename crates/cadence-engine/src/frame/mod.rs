//! Per-frame resource cycling.
//!
//! A `FrameRing` owns two or three `FrameSlot`s. Each slot carries the command
//! list, transient instance storage and signal identities for one frame in
//! flight, and may not be reused until the device reports its previous
//! submission complete.

mod arena;
mod error;
mod ring;
mod slot;

pub use arena::TransientArena;
pub use error::FrameError;
pub use ring::{FrameRing, RingConfig};
pub use slot::{FrameSlot, SlotState};
