//! Allocation domain defaults.
//!
//! The domain is a /16 carved into 256 /24 blocks. In every block the network
//! (`.0`), gateway (`.1`) and broadcast (`.255`) addresses are reserved:
//!
//! | Octet | Range     |
//! |-------|-----------|
//! | 1-2   | prefix    |
//! | 3     | 0 ..= 255 |
//! | 4     | 2 ..= 254 |

use std::ops::RangeInclusive;

/// Default two-octet prefix (`10.100.0.0/16`).
pub const DEFAULT_PREFIX: [u8; 2] = [10, 100];

/// Allocatable third octets.
pub const THIRD_OCTETS: RangeInclusive<u8> = 0..=255;

/// Allocatable fourth octets.
pub const FOURTH_OCTETS: RangeInclusive<u8> = 2..=254;

/// Number of allocatable addresses in one domain.
#[must_use]
pub const fn pool_size() -> usize {
    let third = (*THIRD_OCTETS.end() - *THIRD_OCTETS.start()) as usize + 1;
    let fourth = (*FOURTH_OCTETS.end() - *FOURTH_OCTETS.start()) as usize + 1;
    third * fourth
}

/// Whether a fourth octet is reserved in every /24 block.
#[must_use]
pub const fn is_reserved_host(octet: u8) -> bool {
    matches!(octet, 0 | 1 | 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        // 256 blocks of 253 hosts
        assert_eq!(pool_size(), 64_768);
    }

    #[test]
    fn test_reserved_hosts_are_outside_range() {
        for octet in 0..=u8::MAX {
            assert_eq!(is_reserved_host(octet), !FOURTH_OCTETS.contains(&octet));
        }
    }
}
