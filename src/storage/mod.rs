mod articles;
mod feeds;
mod preferences;
mod schema;
mod types;

pub use preferences::{
    Preferences, KEY_BACKGROUND_ENABLED, KEY_LAST_REFRESH_TIME, KEY_WIFI_ONLY,
};
pub use schema::Database;
pub use types::{Article, DatabaseError, Feed};
