use anyhow::{Context, Result};
use nix::unistd::Pid;
use tracing::{debug, error, info, warn};

use super::addr::{is_valid_ip, with_default_prefix};
use super::backend::{InterfaceManager, NamespaceAnchor, NamespaceEntry, NamespaceRegistry};
use super::config::Config;
use super::error::NetnsError;
use super::model::{
    macvlan_ifname, MacvlanMode, MacvlanRequest, NamespaceInfo, NetnsTarget, Scope, VethAttach,
    VethPair, LOOPBACK,
};

/// The host capabilities an [`Orchestrator`] drives.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub registry: &'a dyn NamespaceRegistry,
    pub net: &'a dyn InterfaceManager,
    pub anchor: &'a dyn NamespaceAnchor,
    pub entry: &'a dyn NamespaceEntry,
}

/// Sequences namespace lifecycle and interface operations.
pub struct Orchestrator<'a> {
    config: &'a Config,
    registry: &'a dyn NamespaceRegistry,
    net: &'a dyn InterfaceManager,
    anchor: &'a dyn NamespaceAnchor,
    entry: &'a dyn NamespaceEntry,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, backends: Backends<'a>) -> Self {
        Self {
            config,
            registry: backends.registry,
            net: backends.net,
            anchor: backends.anchor,
            entry: backends.entry,
        }
    }

    // ─── namespace lifecycle ────────────────────────────────────────────────

    /// Recreate `name` from scratch and attach the interfaces requested in the
    /// config.
    ///
    /// Invalid addresses in the macvlan or veth lists are skipped with a
    /// warning; any tool failure aborts.
    pub fn create(&self, name: &str) -> Result<()> {
        self.ensure_absent(name);

        self.registry
            .add(name)
            .with_context(|| format!("failed to add namespace {name}"))?;
        self.anchor
            .spawn(name, &self.config.shell)
            .with_context(|| format!("failed to start anchor session for {name}"))?;
        let pid = self.anchor.resolve(name)?;
        info!(namespace = name, %pid, "namespace created");

        self.net.set_up(Scope::Anchor(pid), LOOPBACK)?;

        if !self.config.macvlan_ips.is_empty() {
            let uplink = self.net.default_route_interface()?;
            for (index, ip) in self.config.macvlan_ips.iter().enumerate() {
                if !is_valid_ip(ip) {
                    warn!("skipping macvlan: {}", NetnsError::InvalidAddress(ip.clone()));
                    continue;
                }
                let ifname = macvlan_ifname(name, index);
                self.net
                    .create_macvlan(&ifname, &uplink, MacvlanMode::default())
                    .with_context(|| format!("failed to create macvlan {ifname} on {uplink}"))?;
                self.attach_to(name, pid, &ifname, Some(ip))?;
            }
        }

        for VethAttach { ifname, addr } in &self.config.veth {
            if let Some(addr) = addr.as_deref().filter(|a| !is_valid_ip(a)) {
                warn!("skipping {ifname}: {}", NetnsError::InvalidAddress(addr.to_string()));
                continue;
            }
            self.attach_to(name, pid, ifname, addr.as_deref())?;
        }

        Ok(())
    }

    /// Remove every trace of a previous `name` so it can be created again.
    ///
    /// Macvlans made by `create` are deleted; any other interface is returned
    /// to the host so a following `create` can attach it again. Nothing here
    /// fails: a missing anchor, session or namespace counts as already absent.
    pub fn ensure_absent(&self, name: &str) {
        match self.anchor.resolve(name) {
            Ok(pid) => self.release_interfaces(pid),
            Err(e) => debug!("{e}"),
        }
        if let Err(e) = self.anchor.terminate(name) {
            debug!(namespace = name, "no anchor session to stop: {e}");
        }
        if let Err(e) = self.registry.delete(name) {
            debug!(namespace = name, "namespace already absent: {e}");
        }
    }

    fn release_interfaces(&self, pid: Pid) {
        let scope = Scope::Anchor(pid);
        let links = match self.net.list_interfaces(scope) {
            Ok(links) => links,
            Err(e) => {
                warn!("cannot list interfaces of previous namespace: {e}");
                return;
            }
        };

        for link in links.iter().filter(|l| !l.is_loopback()) {
            let result = if link.is_macvlan() {
                self.net.delete_interface(scope, &link.name)
            } else {
                self.net
                    .move_to_namespace(scope, &link.name, &NetnsTarget::host())
            };
            if let Err(e) = result {
                warn!(interface = %link.name, "cannot release interface: {e}");
            }
        }
    }

    /// Delete `name`, every interface inside it and its anchor session.
    pub fn delete(&self, name: &str) -> Result<()> {
        match self.anchor.resolve(name) {
            Ok(pid) => {
                let scope = Scope::Anchor(pid);
                let links = self
                    .net
                    .list_interfaces(scope)
                    .with_context(|| format!("failed to list interfaces in {name}"))?;
                for link in links.iter().filter(|l| !l.is_loopback()) {
                    // Deleting one end of a veth pair removes the other, so a
                    // later entry may already be gone.
                    if let Err(e) = self.net.delete_interface(scope, &link.name) {
                        warn!(interface = %link.name, "cannot delete interface: {e}");
                    }
                }
            }
            Err(e) => warn!("{e}; skipping interface cleanup"),
        }

        if let Err(e) = self.anchor.terminate(name) {
            debug!(namespace = name, "no anchor session to stop: {e}");
        }
        if let Err(e) = self.registry.delete(name) {
            debug!(namespace = name, "namespace deletion failed: {e}");
        }
        Ok(())
    }

    /// Run `cmd` inside `name`, or the configured shell when `cmd` is empty.
    /// Returns the command's exit status.
    pub fn exec(&self, name: &str, cmd: &[String]) -> Result<i32> {
        let pid = self.anchor.resolve(name)?;
        let shell;
        let cmd = if cmd.is_empty() {
            shell = [self.config.shell.clone()];
            &shell[..]
        } else {
            cmd
        };
        let code = self
            .entry
            .exec(pid, cmd)
            .with_context(|| format!("failed to enter namespace {name}"))?;
        Ok(code)
    }

    /// Every namespace together with its anchor process, if one is alive.
    pub fn list(&self) -> Result<Vec<(NamespaceInfo, Option<Pid>)>> {
        let namespaces = self.registry.list().context("failed to list namespaces")?;
        Ok(namespaces
            .into_iter()
            .map(|ns| {
                let pid = self.anchor.resolve(&ns.name).ok();
                (ns, pid)
            })
            .collect())
    }

    // ─── single interfaces ──────────────────────────────────────────────────

    /// Move a host interface into `name`, bring it up and optionally address it.
    pub fn attach(&self, name: &str, ifname: &str, addr: Option<&str>) -> Result<()> {
        if let Some(addr) = addr {
            check_address(addr)?;
        }
        let pid = self.anchor.resolve(name)?;
        self.attach_to(name, pid, ifname, addr)
    }

    fn attach_to(&self, name: &str, pid: Pid, ifname: &str, addr: Option<&str>) -> Result<()> {
        let scope = Scope::Anchor(pid);
        self.net
            .move_to_namespace(Scope::Host, ifname, &NetnsTarget::Named(name.to_string()))
            .with_context(|| format!("failed to move {ifname} into {name}"))?;
        self.net.set_up(scope, ifname)?;
        if let Some(addr) = addr {
            let addr = with_default_prefix(addr);
            self.net
                .assign_address(scope, ifname, &addr)
                .with_context(|| format!("failed to assign {addr} to {ifname}"))?;
        }
        Ok(())
    }

    /// Move `ifname` out of `name` back into the host namespace.
    pub fn detach(&self, name: &str, ifname: &str) -> Result<()> {
        let pid = self.anchor.resolve(name)?;
        self.net
            .move_to_namespace(Scope::Anchor(pid), ifname, &NetnsTarget::host())
            .with_context(|| format!("failed to move {ifname} out of {name}"))?;
        Ok(())
    }

    /// Bring a host interface up and assign it an address.
    pub fn addr(&self, ifname: &str, addr: &str) -> Result<()> {
        check_address(addr)?;
        let addr = with_default_prefix(addr);
        self.net.set_up(Scope::Host, ifname)?;
        self.net
            .assign_address(Scope::Host, ifname, &addr)
            .with_context(|| format!("failed to assign {addr} to {ifname}"))?;
        Ok(())
    }

    // ─── interface creation ─────────────────────────────────────────────────

    /// Create a veth pair for every `end0,end1` argument.
    ///
    /// Malformed pairs are reported and skipped; the returned status is 1 if
    /// any were.
    pub fn veth(&self, pairs: &[String]) -> Result<i32> {
        if pairs.is_empty() {
            return Err(NetnsError::Usage("veth: no interface pairs given".into()).into());
        }

        let mut status = 0;
        for arg in pairs {
            let pair: VethPair = match arg.parse() {
                Ok(pair) => pair,
                Err(e) => {
                    error!("{e}");
                    status = 1;
                    continue;
                }
            };
            self.net
                .create_veth(&pair)
                .with_context(|| format!("failed to create veth pair {arg}"))?;
        }
        Ok(status)
    }

    /// Create the macvlans named in `req`, warning about unknown options.
    pub fn macvlan(&self, req: &MacvlanRequest) -> Result<()> {
        for opt in &req.unknown {
            warn!("macvlan: ignoring unknown option '{opt}'");
        }
        if req.ifnames.is_empty() {
            return Err(NetnsError::Usage("macvlan: no interface names given".into()).into());
        }

        let uplink = match &req.link {
            Some(link) => link.clone(),
            None => self.net.default_route_interface()?,
        };
        for ifname in &req.ifnames {
            self.net
                .create_macvlan(ifname, &uplink, req.mode)
                .with_context(|| format!("failed to create macvlan {ifname} on {uplink}"))?;
        }
        Ok(())
    }
}

fn check_address(addr: &str) -> Result<(), NetnsError> {
    if is_valid_ip(addr) {
        Ok(())
    } else {
        Err(NetnsError::InvalidAddress(addr.to_string()))
    }
}
