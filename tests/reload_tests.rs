use dns_workbench::config_reload::{ReloadCoordinator, ReloadError};
use dns_workbench::dns::{DNSPacket, enums::DNSResourceType, resource::DNSResourceData};
use dns_workbench::metrics::DnsMetrics;
use dns_workbench::resolver::{Outcome, Resolver};
use dns_workbench::zone::{ZoneBuilder, ZoneDefinition, ZoneError, ZoneName, ZoneSnapshot, ZoneStore};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn coordinator() -> ReloadCoordinator {
    let builder = ZoneBuilder::new(ZoneName::parse("localhost").unwrap()).unwrap();
    ReloadCoordinator::new(Arc::new(ZoneStore::default()), builder)
}

fn definition(marker: &str, last_octet: u8) -> ZoneDefinition {
    let address = format!("10.0.0.{}", last_octet);
    ZoneDefinition::default()
        .with_record("test", &format!("{}.test", marker), "a", &address)
        .with_record("test", "shared.test", "a", &address)
        .with_record("test", "shared.test", "txt", marker)
}

fn answer(snapshot: &ZoneSnapshot, name: &str, kind: DNSResourceType) -> (Outcome, DNSPacket) {
    let resolution = Resolver::default().resolve(&DNSPacket::query(1, name, kind), snapshot);
    (resolution.outcome, resolution.response)
}

/// Which definition a snapshot was built from, checking that every name
/// agrees on it
fn generation_marker(snapshot: &ZoneSnapshot) -> &'static str {
    let (_, shared) = answer(snapshot, "shared.test", DNSResourceType::A);
    let (x, _) = answer(snapshot, "x.test", DNSResourceType::A);
    let (y, _) = answer(snapshot, "y.test", DNSResourceType::A);
    let (_, txt) = answer(snapshot, "shared.test", DNSResourceType::TXT);

    assert_eq!(shared.answers.len(), 1);
    assert_eq!(txt.answers.len(), 1);
    match (&shared.answers[0].rdata, &txt.answers[0].rdata) {
        (DNSResourceData::A(addr), DNSResourceData::TXT(strings))
            if *addr == Ipv4Addr::new(10, 0, 0, 1) =>
        {
            assert_eq!(strings, &vec!["x".to_string()]);
            assert_eq!((x, y), (Outcome::Answer, Outcome::NameError));
            "x"
        }
        (DNSResourceData::A(addr), DNSResourceData::TXT(strings))
            if *addr == Ipv4Addr::new(10, 0, 0, 2) =>
        {
            assert_eq!(strings, &vec!["y".to_string()]);
            assert_eq!((x, y), (Outcome::NameError, Outcome::Answer));
            "y"
        }
        other => panic!("snapshot mixes definitions: {:?}", other),
    }
}

#[test]
fn test_malformed_reload_keeps_previous_snapshot() {
    let coordinator = coordinator();
    coordinator.apply(&definition("x", 1)).unwrap();
    let before = coordinator.store().current();

    let broken = definition("y", 2).with_record("test", "broken.test", "a", "not-an-address");
    let err = coordinator.apply(&broken).unwrap_err();
    assert!(matches!(err, ZoneError::MalformedRecord { .. }));

    let after = coordinator.store().current();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(generation_marker(&after), "x");
    assert_eq!(coordinator.store().generation(), 1);
}

#[test]
fn test_unknown_type_reload_reports_error() {
    let coordinator = coordinator();
    coordinator.apply(&definition("x", 1)).unwrap();

    let broken = definition("y", 2).with_record("test", "y.test", "spf", "v=spf1 -all");
    assert_eq!(
        coordinator.apply(&broken),
        Err(ZoneError::UnknownRecordType("spf".to_string()))
    );
    assert_eq!(generation_marker(&coordinator.store().current()), "x");
}

#[test]
fn test_reload_replaces_whole_zone_set() {
    let coordinator = coordinator();
    coordinator.apply(&definition("x", 1)).unwrap();
    coordinator.apply(&definition("y", 2)).unwrap();

    let snapshot = coordinator.store().current();
    assert_eq!(generation_marker(&snapshot), "y");
    assert_eq!(coordinator.store().generation(), 2);
}

#[test]
fn test_concurrent_reloads_publish_one_complete_definition() {
    for _ in 0..20 {
        let coordinator = Arc::new(coordinator());
        coordinator.apply(&definition("x", 1)).unwrap();
        let stop = AtomicBool::new(false);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !stop.load(Ordering::Relaxed) {
                        let snapshot = coordinator.store().current();
                        generation_marker(&snapshot);
                    }
                });
            }

            let first = scope.spawn(|| coordinator.apply(&definition("x", 1)).unwrap());
            let second = scope.spawn(|| coordinator.apply(&definition("y", 2)).unwrap());
            let first = first.join().unwrap();
            let second = second.join().unwrap();
            assert_ne!(first.generation, second.generation);

            stop.store(true, Ordering::Relaxed);
        });

        let marker = generation_marker(&coordinator.store().current());
        assert!(marker == "x" || marker == "y");
        assert_eq!(coordinator.store().generation(), 3);
    }
}

#[test]
fn test_in_flight_snapshot_is_stable_across_reload() {
    let coordinator = coordinator();
    coordinator.apply(&definition("x", 1)).unwrap();

    let held = coordinator.store().current();
    coordinator.apply(&definition("y", 2)).unwrap();

    assert_eq!(generation_marker(&held), "x");
    assert_eq!(generation_marker(&coordinator.store().current()), "y");
}

#[test]
fn test_reload_from_file() {
    let metrics = Arc::new(DnsMetrics::new().unwrap());
    let file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    std::fs::write(
        file.path(),
        "zones:\n  test:\n    x.test:\n      a: [\"10.0.0.1\"]\n",
    )
    .unwrap();

    let coordinator = coordinator()
        .with_metrics(metrics.clone())
        .with_zone_file(file.path());
    let summary = coordinator.reload_zone_file().unwrap();
    assert_eq!(summary.zones, 1);
    assert_eq!(metrics.reload_count(true), 1);

    std::fs::write(file.path(), "zones: [this is not a mapping").unwrap();
    assert!(matches!(
        coordinator.reload_zone_file(),
        Err(ReloadError::Definition(_))
    ));
    assert_eq!(metrics.reload_count(false), 1);
    assert_eq!(coordinator.store().generation(), 1);
}
