//! IP Address Management (IPAM) for VPN peers.
//!
//! Allocation is a pure function of the domain and the set of addresses
//! currently in use. The allocated set is re-derived from the peer directory on
//! every call; nothing is cached or reserved here.
//!
//! [`AddressPool`] does not serialize concurrent callers. Two callers that read
//! the directory at the same instant receive the same candidate. Whoever commits
//! the result must serialize allocate-then-commit, see
//! [`crate::network::registrar::PeerRegistrar`].

use super::defaults;
use super::directory::PeerDirectory;
use crate::error::{Result, VpnodeError};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// The bounded set of addresses eligible for assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationDomain {
    prefix: [u8; 2],
}

impl AllocationDomain {
    pub const fn new(prefix: [u8; 2]) -> Self {
        Self { prefix }
    }

    pub const fn prefix(&self) -> [u8; 2] {
        self.prefix
    }

    /// Whether `addr` is an allocatable address of this domain.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let o = addr.octets();
        o[0] == self.prefix[0]
            && o[1] == self.prefix[1]
            && defaults::THIRD_OCTETS.contains(&o[2])
            && defaults::FOURTH_OCTETS.contains(&o[3])
    }

    /// Every allocatable address, lowest first.
    pub fn candidates(&self) -> impl Iterator<Item = Ipv4Addr> {
        let [a, b] = self.prefix;
        defaults::THIRD_OCTETS
            .flat_map(move |c| defaults::FOURTH_OCTETS.map(move |d| Ipv4Addr::new(a, b, c, d)))
    }

    /// Number of allocatable addresses.
    pub const fn size(&self) -> usize {
        defaults::pool_size()
    }
}

impl Default for AllocationDomain {
    fn default() -> Self {
        Self::new(defaults::DEFAULT_PREFIX)
    }
}

impl fmt::Display for AllocationDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.0.0/16", self.prefix[0], self.prefix[1])
    }
}

impl FromStr for AllocationDomain {
    type Err = VpnodeError;

    /// Parse a two-octet prefix such as `10.100`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VpnodeError::InvalidConfig {
            reason: format!("subnet prefix must look like `10.100`, got `{}`", s),
        };

        let mut parts = s.trim().trim_end_matches('.').split('.');
        let first = parts.next().and_then(|p| p.parse::<u8>().ok()).ok_or_else(invalid)?;
        let second = parts.next().and_then(|p| p.parse::<u8>().ok()).ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new([first, second]))
    }
}

/// Return the lowest address of `domain` absent from `allocated`.
///
/// Scans the third octet ascending and, within it, the fourth octet ascending.
/// Identical inputs always yield the identical result.
///
/// # Errors
///
/// Returns `VpnodeError::PoolExhausted` if every address of the domain is taken.
pub fn allocate(domain: &AllocationDomain, allocated: &HashSet<Ipv4Addr>) -> Result<Ipv4Addr> {
    domain
        .candidates()
        .find(|candidate| !allocated.contains(candidate))
        .ok_or(VpnodeError::PoolExhausted)
}

/// Address allocator over a fixed domain.
#[derive(Debug, Clone)]
pub struct AddressPool {
    domain: AllocationDomain,
}

impl AddressPool {
    pub fn new(domain: AllocationDomain) -> Self {
        info!("Creating address pool (domain: {}, size: {})", domain, domain.size());
        Self { domain }
    }

    pub fn domain(&self) -> AllocationDomain {
        self.domain
    }

    /// Allocate from an already fetched allocated set.
    ///
    /// # Errors
    ///
    /// Returns `VpnodeError::PoolExhausted` if no addresses are available
    pub fn allocate(&self, allocated: &HashSet<Ipv4Addr>) -> Result<Ipv4Addr> {
        match allocate(&self.domain, allocated) {
            Ok(addr) => {
                metrics::counter!("vpnode_ip_allocated_total", "status" => "success").increment(1);
                metrics::gauge!("vpnode_ip_pool_available")
                    .set(self.available(allocated).saturating_sub(1) as f64);
                Ok(addr)
            }
            Err(e) => {
                warn!(domain = %self.domain, "Address pool exhausted");
                metrics::counter!("vpnode_ip_allocated_total", "status" => "exhausted")
                    .increment(1);
                Err(e)
            }
        }
    }

    /// Query the directory fresh and allocate against what it reports.
    ///
    /// A directory failure is returned rather than treated as an empty set, since
    /// that would hand out addresses already in use.
    #[instrument(skip_all, fields(domain = %self.domain))]
    pub async fn next_free(&self, directory: &dyn PeerDirectory) -> Result<Ipv4Addr> {
        let allocated = directory.allocated_addresses().await?;
        self.allocate(&allocated)
    }

    /// Number of domain addresses not in `allocated`.
    pub fn available(&self, allocated: &HashSet<Ipv4Addr>) -> usize {
        let used = allocated.iter().filter(|addr| self.domain.contains(**addr)).count();
        self.domain.size() - used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(addrs: &[&str]) -> HashSet<Ipv4Addr> {
        addrs.iter().map(|a| a.parse().unwrap()).collect()
    }

    #[test]
    fn test_first_allocation_is_dot_two() {
        let domain = AllocationDomain::default();
        assert_eq!(allocate(&domain, &HashSet::new()).unwrap(), Ipv4Addr::new(10, 100, 0, 2));
    }

    #[test]
    fn test_skips_allocated() {
        let domain = AllocationDomain::default();
        let allocated = set(&["10.100.0.2", "10.100.0.3"]);
        assert_eq!(allocate(&domain, &allocated).unwrap(), Ipv4Addr::new(10, 100, 0, 4));
    }

    #[test]
    fn test_fills_gaps_first() {
        let domain = AllocationDomain::default();
        let allocated = set(&["10.100.0.2", "10.100.0.4", "10.100.0.5"]);
        assert_eq!(allocate(&domain, &allocated).unwrap(), Ipv4Addr::new(10, 100, 0, 3));
    }

    #[test]
    fn test_rolls_into_next_block() {
        let domain = AllocationDomain::default();
        let allocated: HashSet<_> = (2..=254).map(|d| Ipv4Addr::new(10, 100, 0, d)).collect();
        assert_eq!(allocate(&domain, &allocated).unwrap(), Ipv4Addr::new(10, 100, 1, 2));
    }

    #[test]
    fn test_ignores_foreign_addresses() {
        let domain = AllocationDomain::default();
        let allocated = set(&["10.8.0.2", "192.168.1.2", "10.100.0.1"]);
        assert_eq!(allocate(&domain, &allocated).unwrap(), Ipv4Addr::new(10, 100, 0, 2));
    }

    #[test]
    fn test_candidates_skip_reserved_hosts() {
        let domain = AllocationDomain::default();
        let mut count = 0;
        for candidate in domain.candidates() {
            assert!(!defaults::is_reserved_host(candidate.octets()[3]));
            count += 1;
        }
        assert_eq!(count, domain.size());
    }

    #[test]
    fn test_contains() {
        let domain = AllocationDomain::new([10, 8]);
        assert!(domain.contains(Ipv4Addr::new(10, 8, 200, 254)));
        assert!(!domain.contains(Ipv4Addr::new(10, 8, 200, 255)));
        assert!(!domain.contains(Ipv4Addr::new(10, 8, 0, 1)));
        assert!(!domain.contains(Ipv4Addr::new(10, 9, 0, 2)));
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!("10.100".parse::<AllocationDomain>().unwrap().prefix(), [10, 100]);
        assert_eq!("172.16.".parse::<AllocationDomain>().unwrap().prefix(), [172, 16]);
        assert!("10".parse::<AllocationDomain>().is_err());
        assert!("10.100.0".parse::<AllocationDomain>().is_err());
        assert!("10.abc".parse::<AllocationDomain>().is_err());
        assert_eq!(AllocationDomain::new([10, 100]).to_string(), "10.100.0.0/16");
    }

    #[test]
    fn test_pool_available() {
        let pool = AddressPool::new(AllocationDomain::default());
        let allocated = set(&["10.100.0.2", "10.100.0.3", "10.8.0.2"]);
        assert_eq!(pool.available(&allocated), defaults::pool_size() - 2);
    }
}
