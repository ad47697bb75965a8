pub mod auth;
pub mod control_service;
pub mod decision;
pub mod device_config;
pub mod error;
pub mod message;
pub mod queue;

pub use auth::*;
pub use control_service::*;
pub use decision::*;
pub use device_config::*;
pub use error::*;
pub use message::*;
pub use queue::*;
