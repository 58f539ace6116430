//! HTTP and WebSocket surface of the roomcall server

pub mod http;
pub mod impls;
