//! # scriptcast-client
//!
//! Client side of the scriptcast system: uploads a script (or names
//! a server-side shared reference), then consumes and renders the
//! response stream on the local terminal.

pub mod driver;
pub mod progress;
pub mod render;

pub use driver::{ClientOptions, Driver};
pub use progress::ProgressMeter;
pub use render::TerminalRenderer;
