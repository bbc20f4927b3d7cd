// Network adapters: the client WebSocket endpoint and the history HTTP routes.

pub mod client;
pub mod dispatch;
pub mod internal;

pub use client::ws_handler;
pub use internal::{history_query_handler, history_save_handler};
