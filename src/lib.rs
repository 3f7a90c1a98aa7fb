pub mod api;
pub mod citation;
pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod papers;
pub mod providers;
pub mod search;
pub mod session;

pub use api::{create_router, AppState};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
