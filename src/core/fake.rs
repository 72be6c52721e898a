//! In-memory stand-in for the kernel, iproute2, tmux and nsenter.
//!
//! Models just enough kernel behavior for lifecycle tests:
//! - moving an interface between namespaces downs it and flushes its addresses
//! - deleting one veth end deletes its peer
//! - deleting a namespace destroys the virtual interfaces inside it and returns
//!   physical ones to the host

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use nix::unistd::Pid;

use super::backend::{InterfaceManager, NamespaceAnchor, NamespaceEntry, NamespaceRegistry};
use super::error::{NetnsError, Result};
use super::model::{
    LinkInfo, MacvlanMode, NamespaceInfo, NetnsTarget, Scope, VethPair, LOOPBACK,
};
use super::netns::Backends;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeLinkKind {
    Physical,
    Veth { peer: String },
    Macvlan { uplink: String, mode: MacvlanMode },
}

#[derive(Debug, Clone)]
pub struct FakeLink {
    pub kind: FakeLinkKind,
    /// `None` while the link is in the host namespace.
    pub netns: Option<String>,
    pub up: bool,
    pub addrs: Vec<String>,
}

impl FakeLink {
    fn new(kind: FakeLinkKind) -> Self {
        Self {
            kind,
            netns: None,
            up: false,
            addrs: Vec::new(),
        }
    }
}

#[derive(Default)]
struct State {
    namespaces: BTreeSet<String>,
    loopback_up: BTreeSet<String>,
    links: BTreeMap<String, FakeLink>,
    sessions: BTreeMap<String, Pid>,
    next_pid: i32,
    default_route: Option<String>,
    execs: Vec<(Pid, Vec<String>)>,
    exec_status: i32,
}

impl State {
    fn scope_netns(&self, scope: Scope) -> Result<Option<String>> {
        match scope {
            Scope::Host => Ok(None),
            Scope::Anchor(pid) => self
                .namespace_of_pid(pid)
                .map(Some)
                .ok_or_else(|| failed("nsenter", 1, &format!("cannot open /proc/{pid}/ns/net"))),
        }
    }

    fn namespace_of_pid(&self, pid: Pid) -> Option<String> {
        self.sessions
            .iter()
            .find(|(_, p)| **p == pid)
            .map(|(name, _)| name.clone())
    }

    fn visible_link(&mut self, scope: Scope, ifname: &str) -> Result<&mut FakeLink> {
        let netns = self.scope_netns(scope)?;
        match self.links.get_mut(ifname) {
            Some(link) if link.netns == netns => Ok(link),
            _ => Err(failed("ip", 1, &format!("Cannot find device \"{ifname}\""))),
        }
    }

    fn ensure_free(&self, ifname: &str) -> Result<()> {
        if self.links.contains_key(ifname) {
            Err(failed("ip", 2, "RTNETLINK answers: File exists"))
        } else {
            Ok(())
        }
    }

    fn remove_link(&mut self, ifname: &str) {
        if let Some(link) = self.links.remove(ifname) {
            if let FakeLinkKind::Veth { peer } = link.kind {
                self.links.remove(&peer);
            }
        }
    }
}

fn failed(program: &str, code: i32, stderr: &str) -> NetnsError {
    NetnsError::CommandFailed {
        program: program.to_string(),
        code,
        stderr: stderr.to_string(),
    }
}

/// A fake host implementing every backend trait.
pub struct FakeHost {
    state: RefCell<State>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                next_pid: 1000,
                ..State::default()
            }),
        }
    }

    pub fn backends(&self) -> Backends<'_> {
        Backends {
            registry: self,
            net: self,
            anchor: self,
            entry: self,
        }
    }

    // ─── setup ──────────────────────────────────────────────────────────────

    pub fn add_physical(&self, ifname: &str) {
        self.state
            .borrow_mut()
            .links
            .insert(ifname.to_string(), FakeLink::new(FakeLinkKind::Physical));
    }

    pub fn add_veth_pair(&self, end0: &str, end1: &str) {
        let mut state = self.state.borrow_mut();
        state.links.insert(
            end0.to_string(),
            FakeLink::new(FakeLinkKind::Veth { peer: end1.to_string() }),
        );
        state.links.insert(
            end1.to_string(),
            FakeLink::new(FakeLinkKind::Veth { peer: end0.to_string() }),
        );
    }

    pub fn add_namespace(&self, name: &str) {
        self.state.borrow_mut().namespaces.insert(name.to_string());
    }

    /// Install a physical uplink carrying the default route.
    pub fn set_default_route(&self, ifname: &str) {
        self.add_physical(ifname);
        self.state.borrow_mut().default_route = Some(ifname.to_string());
    }

    pub fn set_exec_status(&self, code: i32) {
        self.state.borrow_mut().exec_status = code;
    }

    // ─── inspection ─────────────────────────────────────────────────────────

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state.borrow().namespaces.contains(name)
    }

    pub fn anchor_pid(&self, name: &str) -> Option<Pid> {
        self.state.borrow().sessions.get(name).copied()
    }

    pub fn session_count(&self) -> usize {
        self.state.borrow().sessions.len()
    }

    pub fn loopback_up(&self, name: &str) -> bool {
        self.state.borrow().loopback_up.contains(name)
    }

    pub fn link(&self, ifname: &str) -> Option<FakeLink> {
        self.state.borrow().links.get(ifname).cloned()
    }

    /// Names of the non-loopback interfaces inside `name`, sorted.
    pub fn interfaces_in(&self, name: &str) -> Vec<String> {
        self.state
            .borrow()
            .links
            .iter()
            .filter(|(_, l)| l.netns.as_deref() == Some(name))
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn host_interfaces(&self) -> Vec<String> {
        self.state
            .borrow()
            .links
            .iter()
            .filter(|(_, l)| l.netns.is_none())
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn execs(&self) -> Vec<(Pid, Vec<String>)> {
        self.state.borrow().execs.clone()
    }
}

impl NamespaceRegistry for FakeHost {
    fn add(&self, name: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.namespaces.insert(name.to_string()) {
            return Err(failed(
                "ip",
                1,
                &format!("Cannot create namespace file \"/run/netns/{name}\": File exists"),
            ));
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.namespaces.remove(name) {
            return Err(failed(
                "ip",
                1,
                &format!("Cannot remove namespace file \"/run/netns/{name}\": No such file or directory"),
            ));
        }
        state.loopback_up.remove(name);

        let inside: Vec<String> = state
            .links
            .iter()
            .filter(|(_, l)| l.netns.as_deref() == Some(name))
            .map(|(n, _)| n.clone())
            .collect();
        for ifname in inside {
            let physical = matches!(
                state.links.get(&ifname).map(|l| &l.kind),
                Some(FakeLinkKind::Physical)
            );
            if physical {
                if let Some(link) = state.links.get_mut(&ifname) {
                    *link = FakeLink::new(FakeLinkKind::Physical);
                }
            } else {
                state.remove_link(&ifname);
            }
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<NamespaceInfo>> {
        Ok(self
            .state
            .borrow()
            .namespaces
            .iter()
            .map(|name| NamespaceInfo {
                name: name.clone(),
                id: None,
            })
            .collect())
    }
}

impl InterfaceManager for FakeHost {
    fn create_veth(&self, pair: &VethPair) -> Result<()> {
        self.state.borrow().ensure_free(&pair.end0)?;
        self.state.borrow().ensure_free(&pair.end1)?;
        self.add_veth_pair(&pair.end0, &pair.end1);
        Ok(())
    }

    fn create_macvlan(&self, name: &str, uplink: &str, mode: MacvlanMode) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_free(name)?;
        state.visible_link(Scope::Host, uplink)?;
        state.links.insert(
            name.to_string(),
            FakeLink::new(FakeLinkKind::Macvlan {
                uplink: uplink.to_string(),
                mode,
            }),
        );
        Ok(())
    }

    fn default_route_interface(&self) -> Result<String> {
        self.state
            .borrow()
            .default_route
            .clone()
            .ok_or(NetnsError::NoDefaultRoute)
    }

    fn move_to_namespace(&self, scope: Scope, ifname: &str, target: &NetnsTarget) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let dest = match target {
            NetnsTarget::Named(name) if state.namespaces.contains(name) => Some(name.clone()),
            NetnsTarget::Pid(pid) if pid.as_raw() == 1 => None,
            NetnsTarget::Pid(pid) => Some(
                state
                    .namespace_of_pid(*pid)
                    .ok_or_else(|| failed("ip", 2, "RTNETLINK answers: No such process"))?,
            ),
            NetnsTarget::Named(name) => {
                return Err(failed("ip", 255, &format!("Invalid \"netns\" value \"{name}\"")))
            }
        };
        let link = state.visible_link(scope, ifname)?;
        link.netns = dest;
        link.up = false;
        link.addrs.clear();
        Ok(())
    }

    fn set_up(&self, scope: Scope, ifname: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if ifname == LOOPBACK {
            if let Some(ns) = state.scope_netns(scope)? {
                state.loopback_up.insert(ns);
            }
            return Ok(());
        }
        state.visible_link(scope, ifname)?.up = true;
        Ok(())
    }

    fn assign_address(&self, scope: Scope, ifname: &str, addr: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let link = state.visible_link(scope, ifname)?;
        if link.addrs.iter().any(|a| a == addr) {
            return Err(failed("ip", 2, "RTNETLINK answers: File exists"));
        }
        link.addrs.push(addr.to_string());
        Ok(())
    }

    fn list_interfaces(&self, scope: Scope) -> Result<Vec<LinkInfo>> {
        let state = self.state.borrow();
        let netns = state.scope_netns(scope)?;
        let mut links = vec![LinkInfo {
            name: LOOPBACK.to_string(),
            kind: None,
        }];
        links.extend(
            state
                .links
                .iter()
                .filter(|(_, l)| l.netns == netns)
                .map(|(name, l)| LinkInfo {
                    name: name.clone(),
                    kind: match l.kind {
                        FakeLinkKind::Physical => None,
                        FakeLinkKind::Veth { .. } => Some("veth".to_string()),
                        FakeLinkKind::Macvlan { .. } => Some("macvlan".to_string()),
                    },
                }),
        );
        Ok(links)
    }

    fn delete_interface(&self, scope: Scope, ifname: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.visible_link(scope, ifname)?.kind == FakeLinkKind::Physical {
            return Err(failed("ip", 2, "RTNETLINK answers: Operation not supported"));
        }
        state.remove_link(ifname);
        Ok(())
    }
}

impl NamespaceAnchor for FakeHost {
    fn spawn(&self, name: &str, _shell: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.sessions.contains_key(name) {
            return Err(failed("tmux", 1, &format!("duplicate session: {name}")));
        }
        if !state.namespaces.contains(name) {
            return Err(failed("tmux", 1, "server exited unexpectedly"));
        }
        let pid = Pid::from_raw(state.next_pid);
        state.next_pid += 1;
        state.sessions.insert(name.to_string(), pid);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<Pid> {
        self.anchor_pid(name)
            .ok_or_else(|| NetnsError::AnchorNotFound(name.to_string()))
    }

    fn terminate(&self, name: &str) -> Result<()> {
        match self.state.borrow_mut().sessions.remove(name) {
            Some(_) => Ok(()),
            None => Err(failed("tmux", 1, &format!("can't find session: {name}"))),
        }
    }
}

impl NamespaceEntry for FakeHost {
    fn exec(&self, pid: Pid, cmd: &[String]) -> Result<i32> {
        let mut state = self.state.borrow_mut();
        if state.namespace_of_pid(pid).is_none() {
            return Err(failed("nsenter", 1, &format!("cannot open /proc/{pid}/ns/mnt")));
        }
        state.execs.push((pid, cmd.to_vec()));
        Ok(state.exec_status)
    }
}
