use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset and `-v` is not given.
const DEFAULT_FILTER: &str = "warn";

/// Filter used for `-v`: trace every external command this tool runs.
const VERBOSE_FILTER: &str = "warn,netnsctl=debug";

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v` when set.
pub fn init(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
