// Interface adapters: wire protocol, network handling and history store backends.

pub mod http;
pub mod net;
pub mod protocol;
pub mod state;
pub mod stores;
