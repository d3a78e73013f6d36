pub mod backend;
pub mod config;
pub mod errors;
pub mod handler;
pub mod logging;
pub mod models;
pub mod server;

// Re-export commonly used types for convenience
pub use backend::Model;
pub use codec::{CodecRegistry, NumericArray};
pub use config::ServingConfig;
pub use errors::{InvocationError, ModelLoadError, StoreError};
pub use handler::HandlerService;
pub use server::start_server;
