//! Handlers 模块

pub mod lights;
pub mod patterns;
pub mod system;

pub use lights::*;
pub use patterns::*;
pub use system::*;
