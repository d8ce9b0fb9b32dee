pub mod launch;
pub mod passthrough;
