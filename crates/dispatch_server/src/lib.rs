pub mod bus;
pub mod config;
pub mod http;
pub mod notify;
pub mod provider;
