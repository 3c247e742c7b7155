//! # Domain Layer
//!
//! Core definitions, types, and traits that define the business domain of the board.
//! Independent of the chat network and the backing store, serving as the contract for other layers.

pub mod config;
pub mod error;
pub mod events;
pub mod traits;
pub mod types;
