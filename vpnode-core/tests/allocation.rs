//! Allocation properties over the whole domain.
//!
//! ```bash
//! cargo test -p vpnode-core --test allocation
//! ```

use std::collections::HashSet;
use std::net::Ipv4Addr;
use vpnode_core::network::{allocate, AddressPool, AllocationDomain};
use vpnode_core::VpnodeError;

fn domain() -> AllocationDomain {
    AllocationDomain::default()
}

/// Small deterministic generator so the property runs are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn test_lowest_free_address() {
    let allocated: HashSet<Ipv4Addr> =
        [Ipv4Addr::new(10, 100, 0, 2), Ipv4Addr::new(10, 100, 0, 3)].into_iter().collect();
    assert_eq!(allocate(&domain(), &allocated).unwrap(), Ipv4Addr::new(10, 100, 0, 4));
}

#[test]
fn test_empty_set_starts_at_dot_two() {
    assert_eq!(allocate(&domain(), &HashSet::new()).unwrap(), Ipv4Addr::new(10, 100, 0, 2));
}

#[test]
fn test_rolls_over_to_next_block() {
    let allocated: HashSet<Ipv4Addr> = (2..=254).map(|o| Ipv4Addr::new(10, 100, 0, o)).collect();
    assert_eq!(allocate(&domain(), &allocated).unwrap(), Ipv4Addr::new(10, 100, 1, 2));
}

#[test]
fn test_addresses_outside_domain_are_ignored() {
    let allocated: HashSet<Ipv4Addr> =
        [Ipv4Addr::new(10, 200, 0, 2), Ipv4Addr::new(192, 168, 0, 2)].into_iter().collect();
    assert_eq!(allocate(&domain(), &allocated).unwrap(), Ipv4Addr::new(10, 100, 0, 2));
}

#[test]
fn test_full_domain_is_exhausted() {
    let allocated: HashSet<Ipv4Addr> = domain().candidates().collect();
    assert_eq!(allocated.len(), 256 * 253);

    let err = allocate(&domain(), &allocated).unwrap_err();
    assert!(matches!(err, VpnodeError::PoolExhausted));
    assert!(err.is_pool_exhausted());

    let pool = AddressPool::new(domain());
    assert!(pool.allocate(&allocated).unwrap_err().is_pool_exhausted());
    assert_eq!(pool.available(&allocated), 0);
}

#[test]
fn test_last_free_address_is_found() {
    let last = Ipv4Addr::new(10, 100, 255, 254);
    let mut allocated: HashSet<Ipv4Addr> = domain().candidates().collect();
    allocated.remove(&last);
    assert_eq!(allocate(&domain(), &allocated).unwrap(), last);
}

#[test]
fn test_random_sets_yield_free_in_domain_address() {
    let domain = domain();
    let mut rng = Lcg(42);

    for _ in 0..200 {
        let size = (rng.next() % 600) as usize;
        let allocated: HashSet<Ipv4Addr> = (0..size)
            .map(|_| {
                let third = (rng.next() % 3) as u8;
                let fourth = (rng.next() % 256) as u8;
                Ipv4Addr::new(10, 100, third, fourth)
            })
            .collect();

        let addr = allocate(&domain, &allocated).unwrap();
        assert!(domain.contains(addr), "{} outside {}", addr, domain);
        assert!(!allocated.contains(&addr), "{} already allocated", addr);

        let octets = addr.octets();
        assert!((2..=254).contains(&octets[3]));

        // Nothing lower is free.
        assert!(domain.candidates().take_while(|c| *c != addr).all(|c| allocated.contains(&c)));

        // Identical inputs, identical answer.
        assert_eq!(allocate(&domain, &allocated).unwrap(), addr);
    }
}

#[test]
fn test_custom_prefix() {
    let domain: AllocationDomain = "172.16".parse().unwrap();
    let addr = allocate(&domain, &HashSet::new()).unwrap();
    assert_eq!(addr, Ipv4Addr::new(172, 16, 0, 2));
}
