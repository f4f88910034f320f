pub mod client;
pub mod query;

pub use client::BrokerClient;
pub use query::BrokerCommand;
