pub mod config;
pub mod engine;
pub mod logging;
pub mod mailer;
pub mod models;
pub mod pipeline;
pub mod plugins;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{Constraint, Query, Record, Relation};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use task::{Job, Task, TaskOutcome};
pub use utils::error::{AppError, ErrorClass};

pub type Result<T> = std::result::Result<T, AppError>;
