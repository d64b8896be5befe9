pub mod config;
pub mod queries;

pub use config::{ConfigStore, MailerKeys, SchedulerSnapshot, Settings};
pub use queries::{QueryStore, YamlQueryStore};
