//! Capabilities the orchestrator needs from the host.
//!
//! Production implementations shell out to iproute2, tmux and nsenter (see
//! `platform::linux`); tests use the in-memory host in `core::fake`.

use nix::unistd::Pid;

use super::error::Result;
use super::model::{LinkInfo, MacvlanMode, NamespaceInfo, NetnsTarget, Scope, VethPair};

/// Named network namespaces (`ip netns`).
pub trait NamespaceRegistry {
    fn add(&self, name: &str) -> Result<()>;

    /// Fails if the namespace does not exist; callers decide whether that
    /// matters.
    fn delete(&self, name: &str) -> Result<()>;

    fn list(&self) -> Result<Vec<NamespaceInfo>>;
}

/// Creation, movement and addressing of network interfaces.
pub trait InterfaceManager {
    /// Create a veth pair in the host namespace.
    fn create_veth(&self, pair: &VethPair) -> Result<()>;

    /// Create a macvlan named `name` on top of `uplink` in the host namespace.
    fn create_macvlan(&self, name: &str, uplink: &str, mode: MacvlanMode) -> Result<()>;

    /// Device carrying the host's default route.
    fn default_route_interface(&self) -> Result<String>;

    /// Move `ifname`, currently visible in `scope`, into `target`.
    fn move_to_namespace(&self, scope: Scope, ifname: &str, target: &NetnsTarget) -> Result<()>;

    fn set_up(&self, scope: Scope, ifname: &str) -> Result<()>;

    /// Add `addr` (already carrying a prefix length) to `ifname`.
    fn assign_address(&self, scope: Scope, ifname: &str, addr: &str) -> Result<()>;

    /// Every interface visible in `scope`, loopback included.
    fn list_interfaces(&self, scope: Scope) -> Result<Vec<LinkInfo>>;

    fn delete_interface(&self, scope: Scope, ifname: &str) -> Result<()>;
}

/// Long-lived process holding a namespace open, keyed by namespace name.
pub trait NamespaceAnchor {
    /// Start the anchor for `name`, running `shell` inside the namespace.
    fn spawn(&self, name: &str, shell: &str) -> Result<()>;

    /// Find the anchor's leading process.
    ///
    /// # Errors
    /// [`NetnsError::AnchorNotFound`](super::error::NetnsError::AnchorNotFound)
    /// when no live anchor exists.
    fn resolve(&self, name: &str) -> Result<Pid>;

    fn terminate(&self, name: &str) -> Result<()>;
}

/// Running commands inside the namespaces of another process.
pub trait NamespaceEntry {
    /// Run `cmd` in the mount, UTS, IPC, network and PID namespaces of `pid`
    /// with inherited stdio, returning its exit status.
    fn exec(&self, pid: Pid, cmd: &[String]) -> Result<i32>;
}
