//! Utilities
//!
//! Interpreter environment hygiene, bounded output collection, and the
//! `.npy` array codec.

pub mod env_hygiene;
pub mod npy;
pub mod output;
