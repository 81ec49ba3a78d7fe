pub mod load;
pub mod types;

pub use types::{Config, EncodeFormat, EncodingParameters, Settings, ToolCommands};
