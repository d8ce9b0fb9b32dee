pub mod identity;
pub mod logger;
pub mod paths;
