//! Pure building blocks of the pool
//!
//! Nothing in here touches processes or the network.

pub mod frame;
pub mod queue;
pub mod render;

pub use frame::{FrameDecoder, FrameEvent, MAX_FRAME_BYTES};
pub use queue::{PendingRequest, Responder, TierQueue};
