//! Core types for the checkout backend.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod amount;
pub mod email;
pub mod status;

pub use amount::{Amount, AmountError};
pub use email::{Email, EmailError};
pub use status::TransactionStatus;
