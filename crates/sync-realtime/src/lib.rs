pub mod event;
pub mod registry;
pub mod rooms;

pub use event::OutboundEvent;
pub use registry::{FanoutSink, SessionRegistry};
