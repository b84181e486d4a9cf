//! Core traits for the fire-alert bridge
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`TokenStore`]: Persistence for the single push recipient token
//! - [`PushBackend`]: Delivery of one push message to one recipient
//! - [`DatagramHandler`]: Per-datagram unit of work

pub mod handler;
pub mod push_backend;
pub mod token_store;

pub use handler::{Datagram, DatagramHandler};
pub use push_backend::{PushBackend, PushMessage};
pub use token_store::{Token, TokenStore};
