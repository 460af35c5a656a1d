pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod grouper;
pub mod janitor;
pub mod relay;
pub mod scheduler;
pub mod session;
pub mod telegram;
pub mod unlock;
pub mod web;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
