mod cli;
mod core;
mod platform;
mod util;

use std::process;

use crate::core::error::NetnsError;

fn main() {
    let args = cli::parse();

    match cli::commands::dispatch(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("netnsctl: {e:#}");
            let cause = e.chain().find_map(|c| c.downcast_ref::<NetnsError>());
            if cause.is_some_and(NetnsError::is_usage) {
                eprintln!("\n{}", cli::usage());
            }
            process::exit(cause.map_or(1, NetnsError::exit_code));
        }
    }
}
