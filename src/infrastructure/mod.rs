//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (Transport, Publisher, Store, Clock).

pub mod clock;
pub mod matrix;
pub mod store;
