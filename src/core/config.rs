use super::error::NetnsError;
use super::model::VethAttach;

/// Shell used for anchor sessions and bare `exec` when none is configured.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Invocation-wide settings, built once from the command line and handed to
/// every handler.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace given with `-n`; overrides the positional one.
    pub namespace: Option<String>,
    /// Trace external commands.
    pub verbose: bool,
    /// Interfaces `create` moves into the namespace.
    pub veth: Vec<VethAttach>,
    /// Addresses `create` builds macvlan interfaces for.
    pub macvlan_ips: Vec<String>,
    /// Shell run by the anchor session and by `exec` without a command.
    pub shell: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            verbose: false,
            veth: Vec::new(),
            macvlan_ips: Vec::new(),
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl Config {
    /// Split the positional arguments of a namespace-scoped subcommand into
    /// the namespace name and the remaining arguments.
    ///
    /// With `-n` every positional is an argument; otherwise the first
    /// positional names the namespace.
    pub fn split_namespace(&self, positionals: Vec<String>) -> Result<(String, Vec<String>), NetnsError> {
        let mut rest = positionals.into_iter();
        let name = match &self.namespace {
            Some(name) => name.clone(),
            None => rest.next().ok_or(NetnsError::MissingNamespace)?,
        };
        if name.is_empty() {
            return Err(NetnsError::MissingNamespace);
        }
        Ok((name, rest.collect()))
    }
}
