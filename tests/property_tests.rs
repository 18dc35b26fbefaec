//! Property tests for port ranges and report ordering

use async_trait::async_trait;
use portprobe::{CloseReason, PortProber, PortRange, ProbeConfig, ProbeOutcome, ScanEngine};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct SetTarget {
    open: BTreeSet<u16>,
    calls: AtomicUsize,
}

#[async_trait]
impl PortProber for SetTarget {
    async fn probe(&self, _target: IpAddr, port: u16) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.open.contains(&port) {
            ProbeOutcome::Open(port)
        } else {
            ProbeOutcome::Closed(port, CloseReason::Refused)
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn valid_ranges_accepted(start in 1u16..=65535, span in 0u16..2000) {
        let end = start.saturating_add(span);
        let range = PortRange::new(start, end).unwrap();
        prop_assert_eq!(range.len(), (end - start) as usize + 1);
        prop_assert_eq!(range.ports().count(), range.len());
        prop_assert_eq!(range.to_string().parse::<PortRange>().unwrap(), range);
    }

    #[test]
    fn inverted_ranges_rejected(a in 1u16..=65535, b in 1u16..=65535) {
        prop_assume!(a != b);
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        prop_assert!(PortRange::new(high, low).is_err());
    }

    #[test]
    fn report_is_sorted_subset_of_range(
        start in 1u16..=64000,
        span in 0u16..400,
        open in proptest::collection::btree_set(1u16..=65535, 0..40),
        concurrency in 1usize..64,
    ) {
        let end = start + span;
        let range = PortRange::new(start, end).unwrap();
        let prober = Arc::new(SetTarget { open: open.clone(), calls: AtomicUsize::new(0) });
        let engine = ScanEngine::with_prober(ProbeConfig::new(500, concurrency), prober.clone()).unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let report = runtime
            .block_on(engine.scan(IpAddr::V4(Ipv4Addr::LOCALHOST), range))
            .unwrap();

        let expected: Vec<u16> = open.range(start..=end).copied().collect();
        prop_assert_eq!(report.open_ports(), expected.as_slice());
        prop_assert_eq!(prober.calls.load(Ordering::SeqCst), range.len());
        prop_assert!(report.open_ports().windows(2).all(|w| w[0] < w[1]));
    }
}
