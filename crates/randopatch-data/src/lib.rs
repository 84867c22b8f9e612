pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, SessionData, load_session};
