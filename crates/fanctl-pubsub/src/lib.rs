pub mod client;
pub mod conversions;

pub use client::*;
pub use conversions::*;
