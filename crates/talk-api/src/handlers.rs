//! Request handlers.

pub mod analysis;
pub mod health;
pub mod progress;
pub mod videos;

pub use analysis::*;
pub use health::*;
pub use progress::*;
pub use videos::*;
