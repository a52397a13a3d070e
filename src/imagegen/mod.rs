pub mod client;
pub mod params;

pub use client::ImageClient;
pub use params::{BatchParams, GenerateParams};
