//! Release-triggered letter delivery

pub mod dispatch;

pub use dispatch::{spawn_dispatch_task, DeliveryOutcome, DispatchSummary, LetterDispatcher};
