pub mod batches;
pub mod progress;
pub mod uploads;
