//! Mesh processing algorithms.
//!
//! - **Subdivision**: Loop, modified butterfly and a quad-aware hybrid,
//!   expressed as stencils over a parent level
//! - **Progress**: callbacks for long subdivision updates

pub mod progress;
pub mod subdivide;

pub use progress::Progress;
