//! Durable project records: which files were open and the classpath

mod codec;
mod record;
mod store;

pub use codec::{
    ACTIVE_KEY, CLASSPATH_PREFIX, OPEN_PREFIX, Project, deserialize, position_key, serialize,
};
pub use record::Record;
pub use store::{ProjectStore, RECORD_FILE};
