use std::fmt;
use std::str::FromStr;

use nix::unistd::Pid;
use serde::Deserialize;

use super::error::NetnsError;

/// Linux limits interface names to `IFNAMSIZ - 1` bytes.
pub const IFNAME_MAX: usize = 15;

/// Name of the loopback interface present in every namespace.
pub const LOOPBACK: &str = "lo";

/// An interface to move into a namespace, written `ifname[/address]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethAttach {
    pub ifname: String,
    pub addr: Option<String>,
}

impl FromStr for VethAttach {
    type Err = NetnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ifname, addr) = match s.split_once('/') {
            Some((ifname, addr)) => (ifname, Some(addr)),
            None => (s, None),
        };
        if ifname.is_empty() {
            return Err(NetnsError::Usage(format!(
                "veth entry '{s}' has no interface name"
            )));
        }
        Ok(Self {
            ifname: ifname.to_string(),
            addr: addr.filter(|a| !a.is_empty()).map(str::to_string),
        })
    }
}

/// Both ends of a veth pair, written `end0,end1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    pub end0: String,
    pub end1: String,
}

impl FromStr for VethPair {
    type Err = NetnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(',') {
            Some((end0, end1)) if !end0.is_empty() && !end1.is_empty() && !end1.contains(',') => {
                Ok(Self {
                    end0: end0.to_string(),
                    end1: end1.to_string(),
                })
            }
            _ => Err(NetnsError::MalformedVethPair(s.to_string())),
        }
    }
}

/// Forwarding mode of a macvlan interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MacvlanMode {
    Private,
    Vepa,
    #[default]
    Bridge,
    Passthru,
    Source,
}

impl fmt::Display for MacvlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Vepa => write!(f, "vepa"),
            Self::Bridge => write!(f, "bridge"),
            Self::Passthru => write!(f, "passthru"),
            Self::Source => write!(f, "source"),
        }
    }
}

impl FromStr for MacvlanMode {
    type Err = NetnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "vepa" => Ok(Self::Vepa),
            "bridge" => Ok(Self::Bridge),
            "passthru" => Ok(Self::Passthru),
            "source" => Ok(Self::Source),
            other => Err(NetnsError::Usage(format!("unknown macvlan mode '{other}'"))),
        }
    }
}

/// Arguments of the `macvlan` subcommand.
///
/// Parsed by hand rather than by clap so that unrecognised options can be
/// reported and skipped instead of aborting the whole command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacvlanRequest {
    pub mode: MacvlanMode,
    /// Uplink device; `None` means the host's default route interface.
    pub link: Option<String>,
    pub ifnames: Vec<String>,
    /// Options that were not recognised, in the order seen.
    pub unknown: Vec<String>,
}

impl MacvlanRequest {
    pub fn parse(args: &[String]) -> Result<Self, NetnsError> {
        let mut req = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                req.ifnames.extend(iter.by_ref().cloned());
                break;
            }
            if !arg.starts_with('-') || arg == "-" {
                req.ifnames.push(arg.clone());
                continue;
            }

            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value.to_string())),
                None => (arg.as_str(), None),
            };

            match flag {
                "-m" | "--mode" => {
                    let value = option_value(flag, inline, &mut iter)?;
                    req.mode = value.parse()?;
                }
                "-l" | "--link" => {
                    req.link = Some(option_value(flag, inline, &mut iter)?);
                }
                _ => req.unknown.push(arg.clone()),
            }
        }

        Ok(req)
    }
}

fn option_value<'a>(
    flag: &str,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = &'a String>,
) -> Result<String, NetnsError> {
    inline
        .or_else(|| rest.next().cloned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| NetnsError::Usage(format!("option '{flag}' requires a value")))
}

/// Name given to the `index`-th macvlan that `create` makes for `namespace`.
pub fn macvlan_ifname(namespace: &str, index: usize) -> String {
    let mut name = format!("mv{index}-{namespace}");
    if name.len() > IFNAME_MAX {
        let mut cut = IFNAME_MAX;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

/// Where an `ip` invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The caller's own (host) namespaces.
    Host,
    /// Inside the namespaces of a resolved anchor process.
    Anchor(Pid),
}

/// Destination of an interface move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetnsTarget {
    /// A named namespace under `/run/netns`.
    Named(String),
    /// The network namespace of a process.
    Pid(Pid),
}

impl NetnsTarget {
    /// The host's network namespace, i.e. the one PID 1 lives in.
    pub fn host() -> Self {
        Self::Pid(Pid::from_raw(1))
    }
}

impl fmt::Display for NetnsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Pid(pid) => write!(f, "{pid}"),
        }
    }
}

/// An interface as reported by `ip -j -d link show`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkInfo {
    #[serde(rename = "ifname")]
    pub name: String,
    #[serde(rename = "linkinfo", default, deserialize_with = "de_info_kind")]
    pub kind: Option<String>,
}

impl LinkInfo {
    pub fn is_loopback(&self) -> bool {
        self.name == LOOPBACK
    }

    pub fn is_macvlan(&self) -> bool {
        self.kind.as_deref() == Some("macvlan")
    }
}

fn de_info_kind<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Kind {
        info_kind: Option<String>,
    }
    Ok(Option::<Kind>::deserialize(deserializer)?.and_then(|k| k.info_kind))
}

/// A namespace as reported by `ip -j netns list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    #[serde(default)]
    pub id: Option<u32>,
}
