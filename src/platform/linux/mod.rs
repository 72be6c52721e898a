pub mod iproute;
pub mod namespaces;
pub mod process;
pub mod tmux;
