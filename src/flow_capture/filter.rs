use cidr::IpCidr;
use std::net::IpAddr;

use super::types::FlowRecord;

/// CIDR allow-list applied to traffic records before aggregation.
///
/// A record passes when its source or destination lies in any block. An
/// empty filter passes everything, heartbeats included.
#[derive(Debug, Clone, Default)]
pub struct AddressFilter {
    blocks: Vec<IpCidr>,
}

impl AddressFilter {
    pub fn new(blocks: Vec<IpCidr>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn accepts(&self, record: &FlowRecord) -> bool {
        if self.blocks.is_empty() {
            return true;
        }
        match &record.traffic {
            Some(t) => self.matches(t.src_addr) || self.matches(t.dst_addr),
            None => true,
        }
    }

    fn matches(&self, addr: IpAddr) -> bool {
        // IPv4-mapped IPv6 addresses are compared against IPv4 blocks.
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
            v4 => v4,
        };
        self.blocks.iter().any(|block| block.contains(&addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_capture::parser::parse_flow_record;

    fn record(src: &str, dst: &str) -> FlowRecord {
        parse_flow_record(&format!(
            "2 1 eni-1 {} {} 1 2 6 1 100 10 20 ACCEPT OK",
            src, dst
        ))
        .unwrap()
    }

    #[test]
    fn empty_filter_accepts_all() {
        let filter = AddressFilter::default();
        assert!(filter.is_empty());
        assert!(filter.accepts(&record("8.8.8.8", "1.1.1.1")));
    }

    #[test]
    fn matches_either_side() {
        let filter = AddressFilter::new(vec!["10.0.1.0/24".parse().unwrap()]);
        assert!(filter.accepts(&record("10.0.1.5", "52.1.1.1")));
        assert!(filter.accepts(&record("52.1.1.1", "10.0.1.5")));
        assert!(!filter.accepts(&record("10.0.2.5", "52.1.1.1")));
    }

    #[test]
    fn mapped_v4_matches_v4_block() {
        let filter = AddressFilter::new(vec!["192.168.0.0/16".parse().unwrap()]);
        assert!(filter.accepts(&record("::ffff:192.168.4.4", "2001:db8::1")));
        assert!(!filter.accepts(&record("::ffff:10.0.0.1", "2001:db8::1")));
    }

    #[test]
    fn zero_prefix_stays_within_its_family() {
        let filter = AddressFilter::new(vec!["0.0.0.0/0".parse().unwrap()]);
        assert!(filter.accepts(&record("8.8.8.8", "1.1.1.1")));
        assert!(!filter.accepts(&record("2001:db8::1", "2001:db8::2")));
    }

    #[test]
    fn heartbeats_pass() {
        let filter = AddressFilter::new(vec!["10.0.1.0/24".parse().unwrap()]);
        let hb = parse_flow_record("2 1 eni-1 - - - - - - - 10 20 - NODATA").unwrap();
        assert!(filter.accepts(&hb));
    }
}
