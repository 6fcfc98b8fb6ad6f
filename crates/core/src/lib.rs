pub mod codec;
pub mod dispatch_loop;
pub mod models;
pub mod router;
pub mod time_utils;
pub mod traits;

pub use codec::YamlCodec;
pub use dispatch_loop::{DispatchLoop, LoopState, DEFAULT_QUEUE};
pub use models::{Envelope, Message, SubscriptionTag, MSG_TYPE_KEY};
pub use router::MessageRouter;
pub use time_utils::Timestamp;
pub use traits::{Broker, BrokerConnection, MessageHandler};

pub use consumer_errors::{ConsumerError, ConsumerResult};
