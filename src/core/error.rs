use thiserror::Error;

/// Failures raised by the namespace orchestrator and its backends.
#[derive(Error, Debug)]
pub enum NetnsError {
    /// A namespace-scoped subcommand was given no namespace name.
    #[error("no namespace name given")]
    MissingNamespace,

    /// Bad or missing arguments for a subcommand.
    #[error("{0}")]
    Usage(String),

    #[error("invalid IP address '{0}'")]
    InvalidAddress(String),

    #[error("malformed veth pair '{0}', expected <end0>,<end1>")]
    MalformedVethPair(String),

    /// No live anchor session exists for the namespace.
    #[error("no anchor process found for namespace '{0}'")]
    AnchorNotFound(String),

    #[error("no default route; pass an uplink device with --link")]
    NoDefaultRoute,

    /// An external tool ran and exited unsuccessfully.
    #[error("{program} exited with status {code}{}", format_stderr(.stderr))]
    CommandFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    /// An external tool could not be started at all.
    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, NetnsError>;

impl NetnsError {
    /// Whether the error stems from how the tool was invoked, in which case
    /// usage text is printed alongside it.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::MissingNamespace | Self::Usage(_) | Self::InvalidAddress(_)
        )
    }

    /// Process exit status to report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
