mod settings;

pub use settings::{DEFAULT_BUSY_DELAY_MS, DEFAULT_CAPACITY, Settings};
