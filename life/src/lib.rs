//! Conway's Game of Life stepped on a background worker.
//!
//! [`grid::Grid`] holds the two cell buffers and applies the rules;
//! [`driver::Driver`] runs it on a fixed quantum and publishes each finished
//! generation for a renderer to read at its own pace.

pub mod config;
pub mod driver;
pub mod error;
pub mod grid;
pub mod patterns;

pub use config::Config;
pub use driver::{Driver, Frame, RunState, Viewport};
pub use error::{LifeError, Result};
pub use grid::Grid;
