use crate::resolver::Outcome;
use crate::zone::ZoneSnapshot;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder, histogram_opts, opts,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Transport labels used on query metrics
pub const PROTOCOLS: &[&str] = &["udp", "tcp"];

/// Prometheus registry and collectors for the workbench
pub struct DnsMetrics {
    registry: Registry,

    // Query metrics
    queries_total: IntCounterVec,
    query_duration: HistogramVec,
    malformed_packets: IntCounterVec,
    truncated_responses: IntCounterVec,

    // Zone metrics
    reloads_total: IntCounterVec,
    served_zones: IntGauge,
    served_names: IntGauge,
    served_records: IntGauge,
    zone_serial: IntGauge,
    snapshot_generation: IntGauge,
}

impl DnsMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queries_total = IntCounterVec::new(
            opts!(
                "workbench_queries_total",
                "Total number of DNS queries answered"
            ),
            &["protocol", "outcome"],
        )?;

        let query_duration = HistogramVec::new(
            histogram_opts!(
                "workbench_query_duration_seconds",
                "DNS query processing duration in seconds"
            ),
            &["protocol"],
        )?;

        let malformed_packets = IntCounterVec::new(
            opts!(
                "workbench_malformed_packets_total",
                "Total number of DNS messages that could not be decoded"
            ),
            &["protocol", "error_type"],
        )?;

        let truncated_responses = IntCounterVec::new(
            opts!(
                "workbench_truncated_responses_total",
                "Total number of responses truncated due to UDP size limits"
            ),
            &["protocol"],
        )?;

        let reloads_total = IntCounterVec::new(
            opts!(
                "workbench_reloads_total",
                "Total number of zone reload attempts"
            ),
            &["result"],
        )?;

        let served_zones = IntGauge::with_opts(opts!(
            "workbench_zones",
            "Number of zones in the published snapshot"
        ))?;

        let served_names = IntGauge::with_opts(opts!(
            "workbench_names",
            "Number of owner names in the published snapshot"
        ))?;

        let served_records = IntGauge::with_opts(opts!(
            "workbench_records",
            "Number of resource records in the published snapshot"
        ))?;

        let zone_serial = IntGauge::with_opts(opts!(
            "workbench_zone_serial",
            "SOA serial of the published snapshot"
        ))?;

        let snapshot_generation = IntGauge::with_opts(opts!(
            "workbench_snapshot_generation",
            "Number of snapshots published since startup"
        ))?;

        registry.register(Box::new(queries_total.clone()))?;
        registry.register(Box::new(query_duration.clone()))?;
        registry.register(Box::new(malformed_packets.clone()))?;
        registry.register(Box::new(truncated_responses.clone()))?;
        registry.register(Box::new(reloads_total.clone()))?;
        registry.register(Box::new(served_zones.clone()))?;
        registry.register(Box::new(served_names.clone()))?;
        registry.register(Box::new(served_records.clone()))?;
        registry.register(Box::new(zone_serial.clone()))?;
        registry.register(Box::new(snapshot_generation.clone()))?;

        Ok(Self {
            registry,
            queries_total,
            query_duration,
            malformed_packets,
            truncated_responses,
            reloads_total,
            served_zones,
            served_names,
            served_records,
            zone_serial,
            snapshot_generation,
        })
    }

    /// Record an answered query
    pub fn record_query(&self, protocol: &str, outcome: Outcome, duration: Duration) {
        self.queries_total
            .with_label_values(&[protocol, outcome.as_str()])
            .inc();
        self.query_duration
            .with_label_values(&[protocol])
            .observe(duration.as_secs_f64());
    }

    /// Record a malformed packet
    pub fn record_malformed_packet(&self, protocol: &str, error_type: &str) {
        self.malformed_packets
            .with_label_values(&[protocol, error_type])
            .inc();
    }

    /// Record a truncated response
    pub fn record_truncated_response(&self, protocol: &str) {
        self.truncated_responses
            .with_label_values(&[protocol])
            .inc();
    }

    pub fn record_reload(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.reloads_total.with_label_values(&[result]).inc();
    }

    /// Refresh the gauges describing the published snapshot
    pub fn update_snapshot(&self, snapshot: &ZoneSnapshot, generation: u64) {
        self.served_zones.set(snapshot.zone_count() as i64);
        self.served_names.set(snapshot.name_count() as i64);
        self.served_records.set(snapshot.record_count() as i64);
        self.zone_serial.set(i64::from(snapshot.serial()));
        self.snapshot_generation.set(generation as i64);
    }

    /// Answered queries per outcome, summed over protocols
    pub fn queries_by_outcome(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for outcome in Outcome::ALL {
            let count: u64 = PROTOCOLS
                .iter()
                .map(|protocol| {
                    self.queries_total
                        .with_label_values(&[*protocol, outcome.as_str()])
                        .get()
                })
                .sum();
            if count > 0 {
                totals.insert(outcome.as_str().to_string(), count);
            }
        }
        totals
    }

    pub fn reload_count(&self, success: bool) -> u64 {
        let result = if success { "success" } else { "failure" };
        self.reloads_total.with_label_values(&[result]).get()
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
