pub mod processor;
pub mod relay;
