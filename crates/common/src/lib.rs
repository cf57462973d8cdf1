//! Shared value types: node ids, transforms, colors and viewports.
//!
//! Everything here is plain data. Crates above this one decide what the
//! values mean; nothing in here touches a renderer.

mod color;
mod types;

pub use color::{Color, ColorError};
pub use types::{NodeId, Transform, Viewport};
