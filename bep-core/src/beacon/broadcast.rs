use std::net::Ipv4Addr;

/// The directed broadcast address for `ip/prefix` (§8 "Broadcast address"):
/// the host portion is set to all-ones within the mask.
///
/// `172.16.32.33/25 -> 172.16.32.127`, `172.16.32.33/0 -> 255.255.255.255`,
/// a `/32` is returned unchanged.
pub fn directed_broadcast(ip: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let prefix_len = prefix_len.min(32);
    let mask: u32 = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
    let host_mask = !mask;
    let addr = u32::from(ip);
    Ipv4Addr::from(addr | host_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_25_sets_low_seven_bits() {
        assert_eq!(
            directed_broadcast(Ipv4Addr::new(172, 16, 32, 33), 25),
            Ipv4Addr::new(172, 16, 32, 127)
        );
    }

    #[test]
    fn slash_0_is_the_limited_broadcast_address() {
        assert_eq!(
            directed_broadcast(Ipv4Addr::new(172, 16, 32, 33), 0),
            Ipv4Addr::new(255, 255, 255, 255)
        );
    }

    #[test]
    fn slash_32_is_unchanged() {
        assert_eq!(
            directed_broadcast(Ipv4Addr::new(172, 16, 32, 33), 32),
            Ipv4Addr::new(172, 16, 32, 33)
        );
    }

    #[test]
    fn slash_24_sets_last_octet() {
        assert_eq!(
            directed_broadcast(Ipv4Addr::new(10, 0, 1, 5), 24),
            Ipv4Addr::new(10, 0, 1, 255)
        );
    }
}
