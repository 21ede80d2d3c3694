//! Shared core of the Flyin' Wrench gateway: upstream configuration, the tool
//! registry, and the dispatcher every transport surface delegates to.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod tools;

pub use config::{GatewayConfig, Service};
pub use dispatch::Dispatcher;
pub use error::DispatchError;
pub use fetch::{Fetch, HttpFetch};
