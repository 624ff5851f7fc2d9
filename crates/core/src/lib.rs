pub mod config;
pub mod error;
pub mod event;
pub mod rule;

pub use config::{load_dotenv, EngineConfig};
pub use error::*;
pub use event::*;
pub use rule::*;
