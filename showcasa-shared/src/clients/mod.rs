pub mod broker;
pub mod db;
pub mod redis;

pub use broker::{BrokerError, EventPublisher, MemoryBroker};
pub use db::{create_pool, DbPool};
pub use self::redis::{BrokerMessage, RedisPublisher, RedisSubscriber};
