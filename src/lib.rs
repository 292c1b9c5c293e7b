//! Control-plane TLS front door library

pub mod admin;
pub mod cloud;
pub mod config;
pub mod health;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod rpc;
pub mod tls;
pub mod vault;

pub use config::ControlConfig;
pub use lifecycle::{launch, Collaborators, Gateway, Shutdown, StartupError};
