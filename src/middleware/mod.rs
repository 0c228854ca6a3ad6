pub mod health;

pub use health::{CollaboratorHealth, HealthConfig, HealthState};
