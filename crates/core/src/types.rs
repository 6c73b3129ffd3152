/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A progress percentage. Producers clamp into `[0, 100]` before storing.
pub type Percent = u8;
