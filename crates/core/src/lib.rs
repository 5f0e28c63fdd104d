pub mod config;
pub mod ids;
pub mod mime;

pub use config::{AgentConfig, BedrockConfig, Config};
pub use ids::{IdSource, RandomIds, SequentialIds};
pub use mime::Mime;
