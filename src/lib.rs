pub mod config;
pub mod config_reload;
pub mod dns;
pub mod error;
pub mod http_server;
pub mod metrics;
pub mod resolver;
pub mod server;
pub mod zone;

pub use dns::DNSPacket;
