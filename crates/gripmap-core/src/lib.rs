//! # Gripmap Core
//!
//! Shared vocabulary for the gripmap tactile sensing workspace: the
//! anatomical region taxonomy of a five-fingered dexterous hand, the
//! validated sensor layout table, and the workspace-wide error type.

pub mod error;
pub mod layout;
pub mod region;

pub use error::{Error, Result};
pub use layout::*;
pub use region::*;
