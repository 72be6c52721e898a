pub mod commands;

use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::core::config::{Config, DEFAULT_SHELL};
use crate::core::model::VethAttach;

/// Create, populate, enter and tear down Linux network namespaces.
///
/// Each namespace is kept alive by a detached tmux session of the same name
/// whose shell runs inside it. Running `netnsctl NS` with no subcommand is
/// the same as `netnsctl create NS`.
#[derive(Parser, Debug)]
#[command(name = "netnsctl", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Namespace to create when no subcommand is given.
    #[arg(value_name = "NS")]
    pub namespace: Option<String>,
}

/// Options accepted before or after the subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Namespace to operate on; overrides the positional name.
    #[arg(short = 'n', long = "netns", value_name = "NS", global = true)]
    pub netns: Option<String>,

    /// Trace every external command, including namespace-entry command lines.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Interfaces to move into the namespace on create, as IF[/ADDR],...
    #[arg(long, value_name = "IF/ADDR", value_delimiter = ',', global = true)]
    pub veth: Vec<VethAttach>,

    /// Addresses to create macvlan interfaces for on create, as ADDR,...
    #[arg(long = "macvlan-ip", value_name = "ADDR", value_delimiter = ',', global = true)]
    pub macvlan_ip: Vec<String>,

    /// Shell run by the anchor session and by `exec` without a command.
    #[arg(long, value_name = "PATH", env = "NETNSCTL_SHELL", default_value = DEFAULT_SHELL, global = true)]
    pub shell: String,
}

impl GlobalArgs {
    /// Fold the parsed options into the configuration every handler receives.
    pub fn into_config(self) -> Config {
        Config {
            namespace: self.netns,
            verbose: self.verbose,
            veth: self.veth,
            macvlan_ips: self.macvlan_ip,
            shell: self.shell,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recreate a namespace and attach the requested interfaces (default).
    Create {
        /// Namespace name, unless given with -n.
        #[arg(value_name = "NS")]
        args: Vec<String>,
    },

    /// Run a command inside a namespace; a bare `exec` starts the shell.
    Exec {
        /// Namespace name, unless given with -n.
        #[arg(value_name = "NS")]
        args: Vec<String>,

        /// The command (and arguments) to run. Everything after `--`.
        #[arg(last = true)]
        cmd: Vec<String>,
    },

    /// Delete a namespace, its interfaces and its anchor session.
    #[command(alias = "delete")]
    Del {
        /// Namespace name, unless given with -n.
        #[arg(value_name = "NS")]
        args: Vec<String>,
    },

    /// List namespaces and their anchor processes.
    #[command(alias = "list")]
    Ls,

    /// Create veth pairs.
    Veth {
        /// Pairs of interface names, as END0,END1.
        #[arg(value_name = "END0,END1")]
        pairs: Vec<String>,
    },

    /// Create macvlan interfaces on the default route device.
    ///
    /// Options: -m/--mode <private|vepa|bridge|passthru|source> (default
    /// bridge), -l/--link <dev> (default: the default route device).
    /// Unknown options are ignored with a warning.
    Macvlan {
        /// Options followed by interface names.
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Bring an interface up and assign it an address (default /24).
    Addr {
        /// Interface name.
        ifname: String,
        /// IPv4 address, optionally with /PREFIX.
        address: String,
    },

    /// Move an interface into a namespace, bring it up and optionally address it.
    Attach {
        /// NS IF [ADDR], with NS left out when given with -n.
        #[arg(value_name = "ARGS", required = true)]
        args: Vec<String>,
    },

    /// Move an interface out of a namespace back to the host.
    Detach {
        /// NS IF, with NS left out when given with -n.
        #[arg(value_name = "ARGS", required = true)]
        args: Vec<String>,
    },
}

/// Parse CLI arguments. Called from `main`.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Usage line, printed after usage errors.
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}
