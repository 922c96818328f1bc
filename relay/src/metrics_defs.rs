//! Metrics definitions for the relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Time to handle a request in seconds, tagged by handler and status",
};

pub const DELIVERY_DURATION: MetricDef = MetricDef {
    name: "delivery.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent calling the push service in seconds, tagged by outcome",
};

pub const DELIVERY_OUTCOME: MetricDef = MetricDef {
    name: "delivery.outcome",
    metric_type: MetricType::Counter,
    description: "Number of delivery attempts, tagged by outcome",
};

pub const VAPID_REJECTED: MetricDef = MetricDef {
    name: "vapid.rejected",
    metric_type: MetricType::Counter,
    description: "Number of callbacks that failed authentication, tagged by reason",
};

pub const TOKEN_CHECK: MetricDef = MetricDef {
    name: "token_check.result",
    metric_type: MetricType::Counter,
    description: "Number of token checks, tagged by result",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    DELIVERY_DURATION,
    DELIVERY_OUTCOME,
    VAPID_REJECTED,
    TOKEN_CHECK,
];
