//! The connection bridge: one supervised worker per subscriber, each owning
//! a single external stream connection and routing its events.

pub mod router;
pub mod supervisor;
pub mod worker;

pub use router::EventRouter;
pub use supervisor::{ConnectionSupervisor, SubscribeError};
pub use worker::WorkerStatus;
