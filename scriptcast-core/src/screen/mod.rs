//! Screen streaming: the fixed-size frame buffer, the delta
//! compression engine, and the batching multiplexer.

pub mod batch;
pub mod buffer;
pub mod delta;

pub use batch::{FrameBatcher, pack_batch, unpack_batch};
pub use buffer::{SCREEN_HEIGHT, SCREEN_SIZE, SCREEN_WIDTH, ScreenBuffer};
pub use delta::{DeltaEncoder, apply_delta};
