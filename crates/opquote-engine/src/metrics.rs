//! Prometheus metrics for the quote pipeline

use opquote_common::RejectionReason;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

/// Quote pipeline counters and latency histogram
pub struct QuoteMetrics {
    pub requests_total: IntCounter,
    pub quotes_issued_total: IntCounter,
    pub rejections_total: IntCounterVec,
    pub quote_duration_seconds: Histogram,
}

impl QuoteMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            requests_total: IntCounter::new(
                "opquote_quote_requests_total",
                "Total quote requests received",
            )?,
            quotes_issued_total: IntCounter::new(
                "opquote_quotes_issued_total",
                "Total signed quotes issued",
            )?,
            rejections_total: IntCounterVec::new(
                Opts::new(
                    "opquote_quote_rejections_total",
                    "Total quote requests rejected, by reason",
                ),
                &["reason"],
            )?,
            quote_duration_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "opquote_quote_duration_seconds",
                    "Quote request processing duration",
                )
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]),
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.requests_total.clone()))?;
        registry.register(Box::new(self.quotes_issued_total.clone()))?;
        registry.register(Box::new(self.rejections_total.clone()))?;
        registry.register(Box::new(self.quote_duration_seconds.clone()))?;
        Ok(())
    }

    pub fn record_rejection(&self, reason: RejectionReason) {
        self.rejections_total
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    pub fn rejections(&self, reason: RejectionReason) -> u64 {
        self.rejections_total
            .with_label_values(&[reason.as_str()])
            .get()
    }
}

/// Render every metric in `registry` in the text exposition format
pub fn encode_text(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    prometheus::TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
