//! Library crate for the IBM 3705 data-link bridging daemons.
//!
//! See the `dlsw` and `nmodem` binaries for the two shippable entry points.

pub mod config;
pub mod constants;
pub mod dlsw;
pub mod line;
pub mod nullmodem;
pub mod scanner;
pub mod sdlc;
pub mod trace;

pub use config::{DlswConfig, Endpoint, NullModemConfig};
pub use line::Line;
