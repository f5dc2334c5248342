//! Metric data point model.
//!
//! A `MetricRecord` holds exactly one data point together with the identity
//! of the metric stream it belongs to (name, unit, kind). Exporters regroup
//! points of the same stream when re-encoding.

/// Aggregation temporality of cumulative-style metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Temporality {
    /// Not specified by the producer.
    #[default]
    Unspecified,
    /// Each point covers the interval since the previous point.
    Delta,
    /// Each point covers the interval since a fixed start time.
    Cumulative,
}

impl Temporality {
    /// Maps the OTLP enum value.
    #[must_use]
    pub fn from_otlp(value: i32) -> Self {
        match value {
            1 => Self::Delta,
            2 => Self::Cumulative,
            _ => Self::Unspecified,
        }
    }

    /// Returns the OTLP enum value.
    #[must_use]
    pub fn as_otlp(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Delta => 1,
            Self::Cumulative => 2,
        }
    }
}

/// The kind of metric stream a point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Instantaneous value.
    Gauge,
    /// Sum over time.
    Sum {
        /// True if the sum never decreases.
        monotonic: bool,
        /// Aggregation temporality.
        temporality: Temporality,
    },
    /// Explicit-bucket histogram.
    Histogram {
        /// Aggregation temporality.
        temporality: Temporality,
    },
    /// Base-2 exponential bucket histogram.
    ExponentialHistogram {
        /// Aggregation temporality.
        temporality: Temporality,
    },
    /// Pre-computed quantile summary.
    Summary,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gauge => write!(f, "gauge"),
            Self::Sum { .. } => write!(f, "sum"),
            Self::Histogram { .. } => write!(f, "histogram"),
            Self::ExponentialHistogram { .. } => write!(f, "exponential_histogram"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// Histogram point data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramPoint {
    /// Number of observations.
    pub count: u64,
    /// Sum of observations, if recorded.
    pub sum: Option<f64>,
    /// Minimum observation, if recorded.
    pub min: Option<f64>,
    /// Maximum observation, if recorded.
    pub max: Option<f64>,
    /// Bucket upper bounds.
    pub explicit_bounds: Vec<f64>,
    /// Per-bucket counts (`explicit_bounds.len() + 1` entries).
    pub bucket_counts: Vec<u64>,
}

/// A contiguous run of exponential histogram buckets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExponentialBuckets {
    /// Index of the first bucket.
    pub offset: i32,
    /// Counts for buckets `offset..offset + bucket_counts.len()`.
    pub bucket_counts: Vec<u64>,
}

/// Exponential histogram point data.
///
/// Bucket `i` covers `(base^i, base^(i+1)]` where `base = 2^(2^-scale)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExponentialHistogramPoint {
    /// Number of observations.
    pub count: u64,
    /// Sum of observations, if recorded.
    pub sum: Option<f64>,
    /// Minimum observation, if recorded.
    pub min: Option<f64>,
    /// Maximum observation, if recorded.
    pub max: Option<f64>,
    /// Resolution of the bucket boundaries.
    pub scale: i32,
    /// Observations that fell into the zero bucket.
    pub zero_count: u64,
    /// Width of the zero bucket.
    pub zero_threshold: f64,
    /// Buckets for positive observations.
    pub positive: Option<ExponentialBuckets>,
    /// Buckets for negative observations.
    pub negative: Option<ExponentialBuckets>,
}

/// One quantile of a summary point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    /// Quantile in `[0.0, 1.0]`.
    pub quantile: f64,
    /// Observed value at that quantile.
    pub value: f64,
}

/// Summary point data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryPoint {
    /// Number of observations.
    pub count: u64,
    /// Sum of observations.
    pub sum: f64,
    /// Quantile values.
    pub quantiles: Vec<Quantile>,
}

/// The value carried by a data point.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    /// Floating point number.
    Double(f64),
    /// Integer number.
    Int(i64),
    /// Histogram buckets.
    Histogram(HistogramPoint),
    /// Exponential histogram buckets.
    ExponentialHistogram(ExponentialHistogramPoint),
    /// Quantile summary.
    Summary(SummaryPoint),
}

impl PointValue {
    /// Returns the numeric value of a gauge or sum point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Histogram(_) | Self::ExponentialHistogram(_) | Self::Summary(_) => None,
        }
    }
}

/// A single metric data point.
///
/// # Example
///
/// ```
/// use shared::models::{MetricKind, MetricRecord};
///
/// let point = MetricRecord::gauge("system.cpu.utilization", 0.25).with_unit("1");
/// assert_eq!(point.kind, MetricKind::Gauge);
/// assert_eq!(point.value.as_f64(), Some(0.25));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// Metric name.
    pub name: String,
    /// Metric description.
    pub description: String,
    /// Unit in UCUM notation.
    pub unit: String,
    /// Stream kind.
    pub kind: MetricKind,
    /// Start of the aggregation interval (0 if unset).
    pub start_time_unix_nano: u64,
    /// The point value.
    pub value: PointValue,
    /// OTLP data point flags.
    pub flags: u32,
}

impl MetricRecord {
    /// Creates a point of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: MetricKind, value: PointValue) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            kind,
            start_time_unix_nano: 0,
            value,
            flags: 0,
        }
    }

    /// Creates a floating point gauge.
    #[must_use]
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Gauge, PointValue::Double(value))
    }

    /// Creates an integer gauge.
    #[must_use]
    pub fn gauge_int(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, MetricKind::Gauge, PointValue::Int(value))
    }

    /// Creates a cumulative monotonic integer sum.
    #[must_use]
    pub fn counter(name: impl Into<String>, value: i64) -> Self {
        Self::new(
            name,
            MetricKind::Sum {
                monotonic: true,
                temporality: Temporality::Cumulative,
            },
            PointValue::Int(value),
        )
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Sets the start of the aggregation interval.
    #[must_use]
    pub fn with_start_time(mut self, start_time_unix_nano: u64) -> Self {
        self.start_time_unix_nano = start_time_unix_nano;
        self
    }

    /// Returns true if `other` belongs to the same metric stream.
    #[must_use]
    pub fn same_stream(&self, other: &MetricRecord) -> bool {
        self.name == other.name
            && self.unit == other.unit
            && self.description == other.description
            && self.kind == other.kind
    }
}
