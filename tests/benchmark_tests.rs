//! Performance benchmarks for hot proxy paths

use proxy::config::ProxyConfig;
use proxy::player_registry::PlayerRegistry;
use proxy::rank_store::RankStore;
use proxy::topology::ServerTopology;
use shared::{normalize_username, ApplyRankRequest};
use std::time::Instant;

/// Benchmarks routing decisions against the default topology
#[test]
fn benchmark_routing_decisions() {
    let (topology, errors) = ServerTopology::from_config(&ProxyConfig::defaults());
    assert!(errors.is_empty());

    let ranks = ["vip", "mayor", "citizen", "donor", "divine", "helper"];
    let towny = topology.backend_for("towny").unwrap().clone();

    let iterations = 100_000;
    let start = Instant::now();

    let mut routed = 0usize;
    for i in 0..iterations {
        let rank = ranks[i % ranks.len()];
        routed += topology.routed_backends(rank).len();
        if topology.routes_to(rank, &towny) {
            routed += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Routing decisions: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(routed > 0);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks durable grants, one disk write each
#[test]
fn benchmark_persistent_grants() {
    let dir = tempfile::tempdir().unwrap();
    let store = RankStore::new(dir.path().join("ranks.json"));

    let iterations = 500;
    let start = Instant::now();

    for i in 0..iterations {
        let username = format!("player{}", i % 50);
        let rank = format!("rank{}", i);
        assert!(store.grant(&username, &rank).unwrap());
    }

    let duration = start.elapsed();
    println!(
        "Persistent grants: {} grants in {:?} ({:.2} μs/grant)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(store.len(), 50);
    // Should complete in under 10 seconds even on slow disks
    assert!(duration.as_millis() < 10_000);
}

/// Benchmarks duplicate grants, which never touch disk
#[test]
fn benchmark_duplicate_grants() {
    let dir = tempfile::tempdir().unwrap();
    let store = RankStore::new(dir.path().join("ranks.json"));
    store.grant("steve", "vip").unwrap();

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        assert!(!store.grant("Steve", "vip").unwrap());
    }

    let duration = start.elapsed();
    println!(
        "Duplicate grants: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks registry lookups with a large player base
#[test]
fn benchmark_registry_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let registry = PlayerRegistry::new(dir.path().join("players.json"));
    for i in 0..200 {
        registry.mark_seen(&format!("player{}", i));
    }

    let iterations = 100_000;
    let start = Instant::now();

    let mut hits = 0usize;
    for i in 0..iterations {
        if registry.contains(&format!("Player{}", i % 400)) {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Registry lookups: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(hits, iterations / 2);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks parsing and validating apply-rank bodies
#[test]
fn benchmark_request_validation() {
    let bodies = [
        r#"{"username":"Steve","rank":"vip"}"#,
        r#"{"username":"alex","rankId":"mayor"}"#,
        r#"{"username":"","rank":"vip"}"#,
        r#"{"rank":"vip"}"#,
    ];

    let iterations = 50_000;
    let start = Instant::now();

    let mut valid = 0usize;
    for i in 0..iterations {
        let request: ApplyRankRequest = serde_json::from_str(bodies[i % bodies.len()]).unwrap();
        if let Some((username, _rank)) = request.validate() {
            let _ = normalize_username(&username);
            valid += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Request validation: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(valid, iterations / 2);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
