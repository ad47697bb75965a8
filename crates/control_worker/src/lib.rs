pub mod ack;
pub mod consumer;
pub mod control_worker;

pub use ack::*;
pub use consumer::*;
pub use control_worker::*;
