pub mod addr;
pub mod backend;
pub mod config;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod model;
pub mod netns;
