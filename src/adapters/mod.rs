//! Concrete implementations of the ports.
pub mod gateway;
pub mod memory;
pub mod nats;
pub mod postgres;

pub use gateway::SandboxGateway;
pub use memory::MemoryStore;
pub use nats::{LogPublisher, NatsPublisher};
pub use postgres::PgStore;
