pub mod catalog;
pub mod configuration;
pub mod pricing;
pub mod quote;
pub mod snapshot;
