//! Data core of the Dutch municipal moves dashboard.
//!
//! [`render::render`] turns one [`selection::Selection`] into a map payload
//! and a ranking table payload. Nothing is kept between calls.

pub mod boundary;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod render;
pub mod selection;

pub use error::{DashboardError, Result};
