//! Demo scene for the water surface: a node store the reflection core can
//! hide nodes in, simple meshes, a scrolling backdrop and a wind turbine.
//!
//! # Invariants
//! - Node insertion order is draw order.
//! - A node is drawn only if it and every ancestor are visible.

pub mod background;
pub mod demo;
pub mod geometry;
pub mod scene;
pub mod turbine;

pub use background::ScrollingBackground;
pub use demo::DemoScene;
pub use geometry::{MeshData, MeshKind, Vertex};
pub use scene::{Node, Scene, SceneError, Shading};
pub use turbine::{Turbine, TurbineSpin};
