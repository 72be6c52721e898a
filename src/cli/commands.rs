use anyhow::Result;
use tracing::warn;

use crate::cli::{Cli, Command};
use crate::core::config::Config;
use crate::core::error::NetnsError;
use crate::core::model::MacvlanRequest;
use crate::core::netns::{Backends, Orchestrator};

/// Dispatch a parsed CLI command to the appropriate handler, returning the
/// process exit status.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let config = cli.global.into_config();
    crate::util::logging::init(config.verbose);

    #[cfg(not(target_os = "linux"))]
    {
        let _ = (config, cli.command, cli.namespace);
        anyhow::bail!("netnsctl only runs on Linux");
    }

    #[cfg(target_os = "linux")]
    {
        use crate::platform::linux::{iproute::Iproute2, namespaces::NsEnter, tmux::TmuxAnchor};

        let backends = Backends {
            registry: &Iproute2,
            net: &Iproute2,
            anchor: &TmuxAnchor,
            entry: &NsEnter,
        };
        let command = cli.command.unwrap_or_else(|| Command::Create {
            args: cli.namespace.into_iter().collect(),
        });
        if !matches!(command, Command::Ls) {
            warn_unless_root();
        }
        run(&config, backends, command)
    }
}

/// Run one subcommand against the given backends.
pub fn run(config: &Config, backends: Backends<'_>, command: Command) -> Result<i32> {
    let orch = Orchestrator::new(config, backends);

    match command {
        Command::Create { args } => {
            let (ns, rest) = config.split_namespace(args)?;
            no_extra_args("create", &rest)?;
            orch.create(&ns)?;
            Ok(0)
        }
        Command::Exec { args, cmd } => {
            let (ns, rest) = config.split_namespace(args)?;
            no_extra_args("exec", &rest)?;
            orch.exec(&ns, &cmd)
        }
        Command::Del { args } => {
            let (ns, rest) = config.split_namespace(args)?;
            no_extra_args("del", &rest)?;
            orch.delete(&ns)?;
            Ok(0)
        }
        Command::Ls => cmd_ls(&orch),
        Command::Veth { pairs } => orch.veth(&pairs),
        Command::Macvlan { args } => {
            let req = MacvlanRequest::parse(&args)?;
            orch.macvlan(&req)?;
            Ok(0)
        }
        Command::Addr { ifname, address } => {
            orch.addr(&ifname, &address)?;
            Ok(0)
        }
        Command::Attach { args } => {
            let (ns, rest) = config.split_namespace(args)?;
            match rest.as_slice() {
                [ifname] => orch.attach(&ns, ifname, None)?,
                [ifname, addr] => orch.attach(&ns, ifname, Some(addr.as_str()))?,
                _ => return Err(usage("attach expects: NS IF [ADDR]")),
            }
            Ok(0)
        }
        Command::Detach { args } => {
            let (ns, rest) = config.split_namespace(args)?;
            match rest.as_slice() {
                [ifname] => orch.detach(&ns, ifname)?,
                _ => return Err(usage("detach expects: NS IF")),
            }
            Ok(0)
        }
    }
}

// ─── ls ─────────────────────────────────────────────────────────────────────

fn cmd_ls(orch: &Orchestrator<'_>) -> Result<i32> {
    let namespaces = orch.list()?;

    println!("{:<20} {:<6} {}", "NAMESPACE", "ID", "ANCHOR PID");
    for (ns, pid) in namespaces {
        let id = ns.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        let pid = pid.map_or_else(|| "-".to_string(), |pid| pid.to_string());
        println!("{:<20} {:<6} {}", ns.name, id, pid);
    }
    Ok(0)
}

fn no_extra_args(subcommand: &str, rest: &[String]) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(usage(&format!(
            "{subcommand}: unexpected argument '{}'",
            rest[0]
        )))
    }
}

fn usage(msg: &str) -> anyhow::Error {
    NetnsError::Usage(msg.to_string()).into()
}

#[cfg(target_os = "linux")]
fn warn_unless_root() {
    if !nix::unistd::geteuid().is_root() {
        warn!("not running as root; namespace and interface changes will likely fail");
    }
}
