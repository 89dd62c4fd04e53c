pub mod broker;
pub mod router;
pub mod types;
pub mod watch;

pub use broker::{Broker, FakeBroker, MqttBroker};
pub use router::{route, Discriminator};
pub use types::InboundFrame;
pub use watch::FileWatchAdapter;
