use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A network-layer address that can key a resolution cache.
///
/// Implementors have a fixed wire width and are plain values, so a request naming an address
/// can be copied across cores without referring back to the packet it came from.
pub trait ProtocolAddr:
    Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + 'static
{
    /// Width of the address on the wire, in bytes.
    const LEN: usize;

    /// Whether `self` and `other` share the prefix selected by `mask`.
    fn same_subnet(&self, other: &Self, mask: &Self) -> bool;
}

impl ProtocolAddr for Ipv4Addr {
    const LEN: usize = 4;

    fn same_subnet(&self, other: &Self, mask: &Self) -> bool {
        (u32::from(*self) ^ u32::from(*other)) & u32::from(*mask) == 0
    }
}

impl ProtocolAddr for Ipv6Addr {
    const LEN: usize = 16;

    fn same_subnet(&self, other: &Self, mask: &Self) -> bool {
        (u128::from(*self) ^ u128::from(*other)) & u128::from(*mask) == 0
    }
}

/// Netmask with the top `prefix_len` bits set.
pub fn ipv6_mask(prefix_len: u8) -> Ipv6Addr {
    let bits = match prefix_len {
        0 => 0,
        len if len >= 128 => u128::MAX,
        len => u128::MAX << (128 - u32::from(len)),
    };
    Ipv6Addr::from(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_subnet_check() {
        let local = Ipv4Addr::new(10, 0, 0, 1);
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        assert!(local.same_subnet(&Ipv4Addr::new(10, 0, 0, 200), &mask));
        assert!(!local.same_subnet(&Ipv4Addr::new(10, 0, 1, 200), &mask));
        assert!(local.same_subnet(&Ipv4Addr::new(8, 8, 8, 8), &Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn ipv6_subnet_check() {
        let local: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let mask = ipv6_mask(64);
        assert!(local.same_subnet(&"2001:db8::ffff".parse().unwrap(), &mask));
        assert!(!local.same_subnet(&"2001:db8:0:1::1".parse().unwrap(), &mask));
    }

    #[test]
    fn masks() {
        assert_eq!(ipv6_mask(0), Ipv6Addr::UNSPECIFIED);
        assert_eq!(ipv6_mask(128), Ipv6Addr::from(u128::MAX));
        assert_eq!(ipv6_mask(64), "ffff:ffff:ffff:ffff::".parse::<Ipv6Addr>().unwrap());
    }
}
