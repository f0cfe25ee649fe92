pub mod client;
pub mod compiler;
pub mod config;
pub mod error;
pub mod runner;
pub mod scenario;
pub mod statistics;
pub mod web_client;

pub use config::{Cli, Credential, RunConfig};
pub use error::{LoginError, SetupError};
pub use runner::{ContestSession, Runner, SessionFactory};
pub use scenario::Scenario;
pub use statistics::{GlobalResult, WorkerResult};
pub use web_client::{WebClient, WebSessionFactory};
