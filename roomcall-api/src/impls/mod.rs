pub mod connection;

pub use connection::{ConnectionHandler, RecvError, SendError, StreamMessage};
