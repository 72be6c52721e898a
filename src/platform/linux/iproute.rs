use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::namespaces::{enter, NET_FACETS};
use super::process::ExternalCommand;
use crate::core::backend::{InterfaceManager, NamespaceRegistry};
use crate::core::error::{NetnsError, Result};
use crate::core::model::{LinkInfo, MacvlanMode, NamespaceInfo, NetnsTarget, Scope, VethPair};

/// The iproute2 front end.
pub const IP: &str = "ip";

/// Namespace and interface management through `ip(8)`.
///
/// Commands scoped to an anchor run under `nsenter --net` so they see the
/// namespace exactly as the anchor does.
#[derive(Debug, Default, Clone, Copy)]
pub struct Iproute2;

impl Iproute2 {
    fn ip<I, S>(&self, scope: Scope, args: I) -> ExternalCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        match scope {
            Scope::Host => ExternalCommand::new(IP).args(args),
            Scope::Anchor(pid) => {
                let mut argv = vec![IP.to_string()];
                argv.extend(args);
                enter(pid, NET_FACETS, &argv)
            }
        }
    }

    fn json<T: DeserializeOwned>(&self, cmd: ExternalCommand, what: &'static str) -> Result<T> {
        let out = cmd.stdout()?;
        parse_json(&out, what)
    }
}

/// Parse iproute2 `-j` output. Older releases print nothing at all for an
/// empty list, which is treated as `[]`.
fn parse_json<T: DeserializeOwned>(out: &str, what: &'static str) -> Result<T> {
    let out = if out.trim().is_empty() { "[]" } else { out };
    serde_json::from_str(out).map_err(|source| NetnsError::Parse { what, source })
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    dev: Option<String>,
}

impl NamespaceRegistry for Iproute2 {
    fn add(&self, name: &str) -> Result<()> {
        self.ip(Scope::Host, ["netns", "add", name]).check()
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.ip(Scope::Host, ["netns", "del", name]).check()
    }

    fn list(&self) -> Result<Vec<NamespaceInfo>> {
        self.json(self.ip(Scope::Host, ["-j", "netns", "list"]), "namespace list")
    }
}

impl InterfaceManager for Iproute2 {
    fn create_veth(&self, pair: &VethPair) -> Result<()> {
        self.ip(
            Scope::Host,
            [
                "link",
                "add",
                pair.end0.as_str(),
                "type",
                "veth",
                "peer",
                "name",
                pair.end1.as_str(),
            ],
        )
        .check()
    }

    fn create_macvlan(&self, name: &str, uplink: &str, mode: MacvlanMode) -> Result<()> {
        let mode = mode.to_string();
        self.ip(
            Scope::Host,
            ["link", "add", name, "link", uplink, "type", "macvlan", "mode", mode.as_str()],
        )
        .check()
    }

    fn default_route_interface(&self) -> Result<String> {
        let routes: Vec<RouteEntry> = self.json(
            self.ip(Scope::Host, ["-j", "route", "show", "default"]),
            "default route",
        )?;
        routes
            .into_iter()
            .find_map(|r| r.dev)
            .ok_or(NetnsError::NoDefaultRoute)
    }

    fn move_to_namespace(&self, scope: Scope, ifname: &str, target: &NetnsTarget) -> Result<()> {
        let target = target.to_string();
        self.ip(scope, ["link", "set", ifname, "netns", target.as_str()])
            .check()
    }

    fn set_up(&self, scope: Scope, ifname: &str) -> Result<()> {
        self.ip(scope, ["link", "set", ifname, "up"]).check()
    }

    fn assign_address(&self, scope: Scope, ifname: &str, addr: &str) -> Result<()> {
        self.ip(scope, ["addr", "add", addr, "dev", ifname]).check()
    }

    fn list_interfaces(&self, scope: Scope) -> Result<Vec<LinkInfo>> {
        self.json(self.ip(scope, ["-j", "-d", "link", "show"]), "interface list")
    }

    fn delete_interface(&self, scope: Scope, ifname: &str) -> Result<()> {
        self.ip(scope, ["link", "del", ifname]).check()
    }
}
