pub mod logging;
pub mod proc;
