pub mod hub;

pub use hub::{ConnectionHub, OutboundReceiver, OutboundSender};
