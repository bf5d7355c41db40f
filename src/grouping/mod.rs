pub mod clock;
pub mod engine;
pub mod ids;
pub mod session;
pub mod shared;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineSnapshot, GroupingEngine, GroupingError};
pub use ids::{ClusterIdGenerator, SequentialIdGenerator, TimestampIdGenerator};
pub use session::{ClusterId, ExpiryOutOfRange, Session, SessionStatistics};
pub use shared::SharedGroupingEngine;
