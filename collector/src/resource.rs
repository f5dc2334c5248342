//! Resource attribute resolver.
//!
//! Runs once at startup. Each configured detector contributes attributes in
//! list order and the first value set for a key wins. Static attributes from
//! `[processors.resource]` come before every detector.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::client::{parse_resource_attributes, OTEL_RESOURCE_ATTRIBUTES, OTEL_SERVICE_NAME};
use shared::config::{DetectorKind, ResourceConfig, ResourceDetectionConfig};
use shared::models::{Attributes, Resource, SERVICE_NAME};
use std::path::Path;
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};

/// `service.name` used when no detector provides one.
pub const DEFAULT_SERVICE_NAME: &str = "beacon-collector";

/// Path of the instance identity document below the metadata endpoint.
const IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";

/// Resolves the process resource from the environment.
pub async fn resolve(
    detection: &ResourceDetectionConfig,
    resource: &ResourceConfig,
) -> Arc<Resource> {
    resolve_with_env(detection, resource, |key| std::env::var(key).ok()).await
}

/// Resolves the process resource, reading environment variables through
/// `lookup`.
pub async fn resolve_with_env(
    detection: &ResourceDetectionConfig,
    resource: &ResourceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Arc<Resource> {
    let mut attributes: Attributes = resource
        .attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    for detector in &detection.detectors {
        let detected = match detector {
            DetectorKind::Env => detect_env(&lookup),
            DetectorKind::Host => detect_host(),
            DetectorKind::Os => detect_os(),
            DetectorKind::Process => detect_process(),
            DetectorKind::Container => detect_container(),
            DetectorKind::Cloud => detect_cloud(detection).await,
        };
        tracing::debug!(detector = ?detector, attributes = detected.len(), "Resource detector finished");
        attributes.merge_missing(&detected);
    }
    attributes.insert_if_absent(SERVICE_NAME, DEFAULT_SERVICE_NAME);

    tracing::info!(
        attributes = attributes.len(),
        service_name = attributes
            .get(SERVICE_NAME)
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_SERVICE_NAME),
        "Resolved process resource"
    );
    Arc::new(Resource::new(attributes))
}

fn detect_env(lookup: &impl Fn(&str) -> Option<String>) -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(name) = lookup(OTEL_SERVICE_NAME).filter(|v| !v.trim().is_empty()) {
        attributes.insert_if_absent(SERVICE_NAME, name.trim());
    }
    if let Some(raw) = lookup(OTEL_RESOURCE_ATTRIBUTES) {
        attributes.merge_missing(&parse_resource_attributes(&raw));
    }
    attributes
}

fn detect_host() -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(name) = System::host_name() {
        attributes.insert_if_absent("host.name", name);
    }
    attributes.insert_if_absent("host.arch", host_arch(std::env::consts::ARCH));
    attributes
}

/// Maps a Rust target architecture to the semantic convention value.
fn host_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "x86",
        "arm" => "arm32",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        other => other,
    }
}

fn detect_os() -> Attributes {
    let os_type = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let mut attributes = Attributes::new().with("os.type", os_type);
    if let Some(description) = System::long_os_version() {
        attributes.insert_if_absent("os.description", description);
    }
    if let Some(version) = System::kernel_version().or_else(System::os_version) {
        attributes.insert_if_absent("os.version", version);
    }
    attributes
}

fn detect_process() -> Attributes {
    let pid = std::process::id();
    let mut attributes = Attributes::new()
        .with("process.pid", i64::from(pid))
        .with("process.runtime.name", "rust");

    if let Some(name) = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
    {
        attributes.insert_if_absent("process.executable.name", name);
    }

    let mut system = System::new();
    let sys_pid = sysinfo::Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
    let start_time = system
        .process(sys_pid)
        .and_then(|p| i64::try_from(p.start_time()).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);
    attributes.insert_if_absent("process.start_time", start_time.to_rfc3339());
    attributes
}

fn detect_container() -> Attributes {
    let mut attributes = Attributes::new();
    let runtime = if Path::new("/.dockerenv").exists() {
        Some("docker")
    } else if Path::new("/run/.containerenv").exists() {
        Some("podman")
    } else {
        None
    };
    if let Some(runtime) = runtime {
        attributes.insert_if_absent("container.runtime", runtime);
    }
    if let Some(id) = std::fs::read_to_string("/proc/self/cgroup")
        .ok()
        .and_then(|raw| container_id_from_cgroup(&raw))
    {
        attributes.insert_if_absent("container.id", id);
    }
    attributes
}

/// Extracts a 64 hex digit container id from a cgroup table.
pub fn container_id_from_cgroup(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let path = line.rsplit(':').next()?;
        let segment = path.rsplit('/').next()?;
        let segment = segment.strip_suffix(".scope").unwrap_or(segment);
        let id = segment.rsplit('-').next()?;
        (id.len() == 64 && id.bytes().all(|b| b.is_ascii_hexdigit())).then(|| id.to_string())
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    region: Option<String>,
    availability_zone: Option<String>,
    instance_id: Option<String>,
}

async fn detect_cloud(detection: &ResourceDetectionConfig) -> Attributes {
    let url = format!(
        "{}{IDENTITY_DOCUMENT_PATH}",
        detection.cloud_metadata_endpoint.trim_end_matches('/')
    );
    let timeout = detection.timeout();

    match tokio::time::timeout(timeout, fetch_identity_document(&url, timeout)).await {
        Ok(Ok(document)) => cloud_attributes(document),
        Ok(Err(e)) => {
            tracing::debug!(url = %url, error = %e, "Cloud metadata probe failed");
            Attributes::new()
        }
        Err(_) => {
            tracing::info!(
                url = %url,
                timeout_ms = timeout.as_millis(),
                "Cloud metadata probe timed out, continuing without cloud attributes"
            );
            Attributes::new()
        }
    }
}

async fn fetch_identity_document(
    url: &str,
    timeout: std::time::Duration,
) -> Result<IdentityDocument, reqwest::Error> {
    let client = reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()?;
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<IdentityDocument>()
        .await
}

fn cloud_attributes(document: IdentityDocument) -> Attributes {
    let mut attributes = Attributes::new()
        .with("cloud.provider", "aws")
        .with("cloud.platform", "aws_ec2");
    if let Some(region) = document.region {
        attributes.insert_if_absent("cloud.region", region);
    }
    if let Some(zone) = document.availability_zone {
        attributes.insert_if_absent("cloud.availability_zone", zone);
    }
    if let Some(id) = document.instance_id {
        attributes.insert_if_absent("host.id", id);
    }
    attributes
}
