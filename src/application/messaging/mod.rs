//! Typed message sending with FIFO capture

pub mod sender;

pub use sender::{CallOutcome, MessageSender};
