pub mod consumer;
pub mod producer;
pub mod types;

pub use consumer::{EventConsumer, ConsumerConfig, MessageHandler};
pub use producer::{EventProducer, ProducerConfig};
pub use types::{EventEnvelope, EventType, TransactionEvent};
