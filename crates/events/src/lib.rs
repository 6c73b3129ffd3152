//! Progress broadcast and batch lifecycle events.
//!
//! [`ProgressChannel`] holds the single global progress value and fans
//! it out to subscribers. [`EventBus`] carries richer batch lifecycle
//! notifications (job started, job failed, batch completed).

pub mod bus;
pub mod channel;

pub use bus::{BatchEvent, BatchEventKind, EventBus};
pub use channel::{ProgressChannel, ProgressChannelError, ProgressSubscription, SubscriberId};
