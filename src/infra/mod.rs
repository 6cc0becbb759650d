//! Infrastructure adapters: persistence, telemetry, the payment gateway
//! client, and the HTTP surface.

pub mod db;
pub mod dev;
pub mod error;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod telemetry;
