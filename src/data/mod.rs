pub mod parser;
pub mod fetcher;
pub mod pubsub;
pub mod controller;

pub use parser::{StockRecord, ResponseParser};
pub use fetcher::{Fetcher, build_http_client};
pub use pubsub::{Broadcaster, SnapshotMessage, SubscriptionMessage, SubscriptionResponse, STOCKS_TOPIC};
pub use controller::{Poller, PollerHandle, PollSchedule, CycleOutcome};
