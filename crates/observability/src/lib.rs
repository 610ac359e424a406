use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    queries_total: AtomicU64,
    travel_options_total: AtomicU64,
    fallback_total: AtomicU64,
    rejected_submissions_total: AtomicU64,
    cancelled_replies_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub travel_options_total: u64,
    pub fallback_total: u64,
    pub rejected_submissions_total: u64,
    pub cancelled_replies_total: u64,
    pub avg_latency_micros: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_query(&self, fallback: bool, latency: Duration) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        if fallback {
            self.fallback_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.travel_options_total.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn inc_rejected_submission(&self) {
        self.rejected_submissions_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_cancelled_replies(&self, count: usize) {
        self.cancelled_replies_total
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let queries = self.queries_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            queries_total: queries,
            travel_options_total: self.travel_options_total.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            rejected_submissions_total: self.rejected_submissions_total.load(Ordering::Relaxed),
            cancelled_replies_total: self.cancelled_replies_total.load(Ordering::Relaxed),
            avg_latency_micros: if queries == 0 {
                0.0
            } else {
                latency as f64 / queries as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(default_filter(service_name))
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

/// Writes to stderr at `warn` unless `RUST_LOG` says otherwise; stdout stays the chat transcript.
pub fn init_tracing_stderr() {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}

fn default_filter(service_name: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}=info,rihla_api=info,rihla_chat=info,tower_http=info",
            service_name
        ))
    })
}
