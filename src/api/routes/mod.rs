//! API Routes
//!
//! Route handlers organized by functionality.

pub mod broadcast;
pub mod health;
pub mod status;
