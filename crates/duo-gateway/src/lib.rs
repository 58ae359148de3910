//! # duo-gateway
//!
//! WebSocket gateway for the anonymous pair-chat service.

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::run;
