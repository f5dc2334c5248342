//! Client-facing configuration contract.
//!
//! Applications that send telemetry to Beacon are configured with the
//! standard OpenTelemetry SDK environment variables:
//!
//! | variable | effect |
//! |----------|--------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | base URL of the receiver |
//! | `OTEL_EXPORTER_OTLP_{METRICS,LOGS,TRACES}_ENDPOINT` | full URL for one signal |
//! | `OTEL_EXPORTER_OTLP_PROTOCOL` | `grpc`, `http/protobuf` or `http/json` |
//! | `OTEL_SERVICE_NAME` | `service.name` of the client resource |
//! | `OTEL_RESOURCE_ATTRIBUTES` | `key=value,key2=value2`, values percent-encoded |
//!
//! The collector parses `OTEL_RESOURCE_ATTRIBUTES` the same way for its own
//! resource.

use crate::config::{ConfigError, ExporterConfig, ExporterKind, HttpEncoding};
use crate::models::{Attributes, Resource, Signal, SERVICE_NAME};

/// Base endpoint variable.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Protocol selector variable.
pub const OTEL_EXPORTER_OTLP_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_PROTOCOL";
/// Service name variable.
pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
/// Resource attributes variable.
pub const OTEL_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";

/// Service name used when none is configured.
pub const DEFAULT_CLIENT_SERVICE_NAME: &str = "unknown_service";

/// Wire protocol a client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientProtocol {
    /// OTLP/gRPC.
    Grpc,
    /// OTLP/HTTP with protobuf bodies.
    #[default]
    HttpProtobuf,
    /// OTLP/HTTP with JSON bodies.
    HttpJson,
}

impl ClientProtocol {
    /// Parses a protocol selector value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "grpc" => Some(Self::Grpc),
            "http/protobuf" => Some(Self::HttpProtobuf),
            "http/json" => Some(Self::HttpJson),
            _ => None,
        }
    }

    /// Endpoint used when none is configured.
    #[must_use]
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Grpc => "http://localhost:4317",
            Self::HttpProtobuf | Self::HttpJson => "http://localhost:4318",
        }
    }
}

/// Settings an application uses to address the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Base endpoint.
    pub endpoint: String,
    /// Per-signal endpoint overrides, indexed by [`Signal::index`].
    pub signal_endpoints: [Option<String>; 3],
    /// Wire protocol.
    pub protocol: ClientProtocol,
    /// Explicit service name.
    pub service_name: Option<String>,
    /// Extra resource attributes.
    pub resource_attributes: Attributes,
}

impl ClientSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol selector is not recognized.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol selector is not recognized.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let protocol = match non_empty(OTEL_EXPORTER_OTLP_PROTOCOL) {
            Some(value) => ClientProtocol::parse(&value).ok_or_else(|| {
                ConfigError::invalid(
                    OTEL_EXPORTER_OTLP_PROTOCOL,
                    format!("unsupported protocol `{value}`"),
                )
            })?,
            None => ClientProtocol::default(),
        };

        let signal_endpoints = Signal::ALL.map(|signal| {
            non_empty(&format!(
                "OTEL_EXPORTER_OTLP_{}_ENDPOINT",
                signal.to_string().to_ascii_uppercase()
            ))
        });

        Ok(Self {
            endpoint: non_empty(OTEL_EXPORTER_OTLP_ENDPOINT)
                .unwrap_or_else(|| protocol.default_endpoint().to_string()),
            signal_endpoints,
            protocol,
            service_name: non_empty(OTEL_SERVICE_NAME),
            resource_attributes: non_empty(OTEL_RESOURCE_ATTRIBUTES)
                .map(|raw| parse_resource_attributes(&raw))
                .unwrap_or_default(),
        })
    }

    /// URL a client sends `signal` to.
    #[must_use]
    pub fn signal_endpoint(&self, signal: Signal) -> String {
        if let Some(url) = &self.signal_endpoints[signal.index()] {
            return url.clone();
        }
        match self.protocol {
            ClientProtocol::Grpc => self.endpoint.clone(),
            ClientProtocol::HttpProtobuf | ClientProtocol::HttpJson => format!(
                "{}{}",
                self.endpoint.trim_end_matches('/'),
                signal.http_path()
            ),
        }
    }

    /// The client resource: `OTEL_SERVICE_NAME` wins over a `service.name`
    /// in `OTEL_RESOURCE_ATTRIBUTES`, which wins over the default.
    #[must_use]
    pub fn resource(&self) -> Resource {
        let mut attributes = Attributes::new();
        if let Some(name) = &self.service_name {
            attributes.insert_if_absent(SERVICE_NAME, name.as_str());
        }
        attributes.merge_missing(&self.resource_attributes);
        attributes.insert_if_absent(SERVICE_NAME, DEFAULT_CLIENT_SERVICE_NAME);
        Resource::new(attributes)
    }

    /// Exporter entry that sends to the collector as this client would.
    #[must_use]
    pub fn exporter_config(&self, name: impl Into<String>) -> ExporterConfig {
        let (kind, encoding) = match self.protocol {
            ClientProtocol::Grpc => (ExporterKind::OtlpGrpc, HttpEncoding::Protobuf),
            ClientProtocol::HttpProtobuf => (ExporterKind::OtlpHttp, HttpEncoding::Protobuf),
            ClientProtocol::HttpJson => (ExporterKind::OtlpHttp, HttpEncoding::Json),
        };
        let [metrics_endpoint, logs_endpoint, traces_endpoint] =
            Signal::ALL.map(|signal| Some(self.signal_endpoint(signal)));
        ExporterConfig {
            kind,
            encoding,
            endpoint: Some(self.endpoint.clone()),
            metrics_endpoint,
            logs_endpoint,
            traces_endpoint,
            ..ExporterConfig::debug(name)
        }
    }
}

/// Parses `key=value,key2=value2`. Values are percent-decoded; malformed
/// entries are skipped and the first occurrence of a key wins.
#[must_use]
pub fn parse_resource_attributes(raw: &str) -> Attributes {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = urlencoding::decode(value.trim()).ok()?;
            Some((key.to_string(), value.into_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeValue;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.protocol, ClientProtocol::HttpProtobuf);
        assert_eq!(
            settings.signal_endpoint(Signal::Traces),
            "http://localhost:4318/v1/traces"
        );
        assert_eq!(settings.resource().service_name(), Some("unknown_service"));
    }

    #[test]
    fn test_grpc_endpoint_is_not_suffixed() {
        let settings = ClientSettings::from_lookup(lookup(&[
            ("OTEL_EXPORTER_OTLP_PROTOCOL", "grpc"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://beacon:4317"),
        ]))
        .unwrap();
        assert_eq!(settings.signal_endpoint(Signal::Metrics), "http://beacon:4317");
    }

    #[test]
    fn test_signal_endpoint_override() {
        let settings = ClientSettings::from_lookup(lookup(&[(
            "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT",
            "http://logs:4318/custom",
        )]))
        .unwrap();
        assert_eq!(settings.signal_endpoint(Signal::Logs), "http://logs:4318/custom");
    }

    #[test]
    fn test_unknown_protocol_is_error() {
        let err = ClientSettings::from_lookup(lookup(&[("OTEL_EXPORTER_OTLP_PROTOCOL", "udp")]))
            .unwrap_err();
        assert!(err.to_string().contains("OTEL_EXPORTER_OTLP_PROTOCOL"));
    }

    #[test]
    fn test_service_name_precedence() {
        let settings = ClientSettings::from_lookup(lookup(&[
            ("OTEL_SERVICE_NAME", "checkout"),
            ("OTEL_RESOURCE_ATTRIBUTES", "service.name=ignored,team=payments"),
        ]))
        .unwrap();
        let resource = settings.resource();
        assert_eq!(resource.service_name(), Some("checkout"));
        assert_eq!(
            resource.attributes().get("team").and_then(AttributeValue::as_str),
            Some("payments")
        );
    }

    #[test]
    fn test_parse_resource_attributes() {
        let attrs = parse_resource_attributes(
            "deployment.environment=prod, region=eu%2Dwest%201,bad,=novalue,region=dup",
        );
        assert_eq!(attrs.len(), 2);
        assert_eq!(
            attrs.get("region").and_then(AttributeValue::as_str),
            Some("eu-west 1")
        );
        assert_eq!(
            attrs.get("deployment.environment").and_then(AttributeValue::as_str),
            Some("prod")
        );
    }

    #[test]
    fn test_exporter_config_follows_protocol() {
        let settings =
            ClientSettings::from_lookup(lookup(&[("OTEL_EXPORTER_OTLP_PROTOCOL", "http/json")]))
                .unwrap();
        let exporter = settings.exporter_config("demo");
        assert_eq!(exporter.kind, ExporterKind::OtlpHttp);
        assert_eq!(exporter.encoding, HttpEncoding::Json);
        assert_eq!(
            exporter.endpoint_for(Signal::Metrics).as_deref(),
            Some("http://localhost:4318/v1/metrics")
        );
    }
}
