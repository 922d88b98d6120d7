use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const STAGE: &str = "stage";
    pub const REASON: &str = "reason";
    pub const COMPONENT: &str = "component";
    pub const TENANT: &str = "tenant";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod stages {
    pub const VALIDATION: &str = "validation";
    pub const THREAT: &str = "threat";
    pub const RATE_LIMIT: &str = "rate_limit";
    pub const DUPLICATE: &str = "duplicate";
}

#[derive(Clone)]
pub struct Metrics {
    pub events_total: Counter<u64>,
    pub admitted_total: Counter<u64>,
    pub rejected_total: Counter<u64>,
    pub decision_duration_seconds: Histogram<f64>,

    pub sessions_active: UpDownCounter<i64>,
    pub sessions_created_total: Counter<u64>,
    pub orders_completed_total: Counter<u64>,

    pub blocks_total: Counter<u64>,
    pub sweep_evictions_total: Counter<u64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            events_total: meter
                .u64_counter("bodega_events_total")
                .with_description("Total number of inbound events evaluated")
                .build(),
            admitted_total: meter
                .u64_counter("bodega_admitted_total")
                .with_description("Total number of events admitted to business logic")
                .build(),
            rejected_total: meter
                .u64_counter("bodega_rejected_total")
                .with_description("Total number of events rejected, by stage and reason")
                .build(),
            decision_duration_seconds: meter
                .f64_histogram("bodega_decision_duration_seconds")
                .with_description("Admission decision duration in seconds")
                .build(),

            sessions_active: meter
                .i64_up_down_counter("bodega_sessions_active")
                .with_description("Number of live conversational sessions")
                .build(),
            sessions_created_total: meter
                .u64_counter("bodega_sessions_created_total")
                .with_description("Total number of sessions created")
                .build(),
            orders_completed_total: meter
                .u64_counter("bodega_orders_completed_total")
                .with_description("Total number of orders completed (terminal session action)")
                .build(),

            blocks_total: meter
                .u64_counter("bodega_blocks_total")
                .with_description("Total number of temporary blocks placed, by component")
                .build(),
            sweep_evictions_total: meter
                .u64_counter("bodega_sweep_evictions_total")
                .with_description("Total entries evicted by periodic sweeps, by component")
                .build(),

            build_info: meter
                .u64_gauge("bodega_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_event(&self, tenant: &str) {
        self.events_total
            .add(1, &[KeyValue::new(labels::TENANT, tenant.to_string())]);
    }

    pub fn record_admitted(&self, duration_secs: f64) {
        self.admitted_total.add(1, &[]);
        self.decision_duration_seconds.record(duration_secs, &[]);
    }

    pub fn record_rejected(&self, stage: &str, reason: &str, duration_secs: f64) {
        self.rejected_total.add(
            1,
            &[
                KeyValue::new(labels::STAGE, stage.to_string()),
                KeyValue::new(labels::REASON, reason.to_string()),
            ],
        );
        self.decision_duration_seconds.record(duration_secs, &[]);
    }

    pub fn record_session_created(&self) {
        self.sessions_created_total.add(1, &[]);
    }

    /// Reconcile the active-sessions gauge against the store. Sessions leave
    /// the store on several paths (terminal action, lazy expiry, sweeps,
    /// pressure eviction), so the pipeline reports the delta to the actual
    /// count instead of counting events.
    pub fn adjust_sessions_active(&self, delta: i64) {
        if delta != 0 {
            self.sessions_active.add(delta, &[]);
        }
    }

    pub fn record_order_completed(&self) {
        self.orders_completed_total.add(1, &[]);
    }

    pub fn record_block(&self, component: &str) {
        self.blocks_total
            .add(1, &[KeyValue::new(labels::COMPONENT, component.to_string())]);
    }

    pub fn record_sweep_evictions(&self, component: &str, evicted: u64) {
        if evicted > 0 {
            self.sweep_evictions_total.add(
                evicted,
                &[KeyValue::new(labels::COMPONENT, component.to_string())],
            );
        }
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("bodega");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
