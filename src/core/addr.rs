/// Prefix length appended to addresses given without one.
pub const DEFAULT_PREFIX_LEN: u8 = 24;

/// Check that `addr` looks like a dotted-quad IPv4 address, optionally followed
/// by `/prefix`.
///
/// This is a syntactic and range check only: each of the four groups must be
/// 1-3 ASCII digits with a value of at most 255. Leading zeros are accepted and
/// the prefix text is not inspected.
pub fn is_valid_ip(addr: &str) -> bool {
    let host = match addr.split_once('/') {
        Some((host, _prefix)) => host,
        None => addr,
    };

    let octets: Vec<&str> = host.split('.').collect();
    if octets.len() != 4 {
        return false;
    }

    octets.iter().all(|octet| {
        (1..=3).contains(&octet.len())
            && octet.bytes().all(|b| b.is_ascii_digit())
            && octet.parse::<u16>().map(|v| v <= 255).unwrap_or(false)
    })
}

/// Append `/24` to `addr` unless it already ends in `/<digits>`.
pub fn with_default_prefix(addr: &str) -> String {
    let has_prefix = addr
        .rsplit_once('/')
        .is_some_and(|(_, len)| !len.is_empty() && len.bytes().all(|b| b.is_ascii_digit()));

    if has_prefix {
        addr.to_string()
    } else {
        format!("{addr}/{DEFAULT_PREFIX_LEN}")
    }
}
