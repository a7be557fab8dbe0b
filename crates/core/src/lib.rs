//! Webpay Checkout Core - Shared types library.
//!
//! This crate provides the types shared by the checkout server and its tests:
//! - `server` - HTTP backend that talks to Webpay and the email provider
//! - `integration-tests` - End-to-end tests through the server router
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no global state. Cart validation lives here because it is a pure
//! function of the submitted cart.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, amounts and gateway statuses
//! - [`cart`] - Cart and customer validation
//! - [`order`] - Order snapshots awaiting payment confirmation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod types;

pub use cart::{
    CartError, CartItemInput, Customer, CustomerInput, OrderLine, ValidatedOrder,
    validate_checkout,
};
pub use order::OrderSnapshot;
pub use types::*;
