pub mod codec;
pub mod config;
pub mod duration;
pub mod errors;
pub mod idgen;
pub mod logging;
pub mod models;
pub mod registry;
pub mod traits;

pub use codec::JobCodec;
pub use config::*;
pub use duration::{format_duration, parse_duration};
pub use errors::*;
pub use idgen::RunIdGenerator;
pub use logging::init_logging;
pub use models::*;
pub use registry::*;
pub use traits::*;

/// 当前版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
