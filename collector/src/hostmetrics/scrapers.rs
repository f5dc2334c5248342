//! One scraper per series family.

use super::diskstats::read_diskstats;
use super::ScrapeError;
use shared::models::{Attributes, MetricKind, MetricRecord, PointValue, Temporality};
use std::path::Path;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};

/// A metric point and its data point attributes.
pub type Point = (MetricRecord, Attributes);

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Non-monotonic cumulative sum, for usage values that go up and down.
fn up_down(name: &str, value: u64) -> MetricRecord {
    MetricRecord::new(
        name,
        MetricKind::Sum {
            monotonic: false,
            temporality: Temporality::Cumulative,
        },
        PointValue::Int(to_i64(value)),
    )
}

/// `system.cpu.utilization` per core and in aggregate, 0.0 to 1.0.
pub fn cpu(system: &mut System) -> Result<Vec<Point>, ScrapeError> {
    system.refresh_cpu_usage();
    let cpus = system.cpus();
    if cpus.is_empty() {
        return Err(ScrapeError::Unsupported("cpu statistics"));
    }

    let mut points: Vec<Point> = cpus
        .iter()
        .enumerate()
        .map(|(index, cpu)| {
            (
                MetricRecord::gauge(
                    "system.cpu.utilization",
                    f64::from(cpu.cpu_usage() / 100.0).clamp(0.0, 1.0),
                )
                .with_unit("1"),
                Attributes::new().with("cpu", format!("cpu{index}")),
            )
        })
        .collect();
    points.push((
        MetricRecord::gauge(
            "system.cpu.utilization",
            f64::from(system.global_cpu_usage() / 100.0).clamp(0.0, 1.0),
        )
        .with_unit("1"),
        Attributes::new(),
    ));
    Ok(points)
}

/// `system.memory.usage` by state and `system.memory.utilization`.
pub fn memory(system: &mut System) -> Result<Vec<Point>, ScrapeError> {
    system.refresh_memory();
    let total = system.total_memory();
    if total == 0 {
        return Err(ScrapeError::Unsupported("memory statistics"));
    }
    let used = system.used_memory();
    let free = total.saturating_sub(used);

    Ok(vec![
        (
            up_down("system.memory.usage", used).with_unit("By"),
            Attributes::new().with("state", "used"),
        ),
        (
            up_down("system.memory.usage", free).with_unit("By"),
            Attributes::new().with("state", "free"),
        ),
        (
            MetricRecord::gauge("system.memory.utilization", ratio(used, total)).with_unit("1"),
            Attributes::new().with("state", "used"),
        ),
    ])
}

/// `system.disk.io` and `system.disk.operations` per device and direction.
pub fn disk(diskstats_path: &Path) -> Result<Vec<Point>, ScrapeError> {
    let disks = read_diskstats(diskstats_path)?;
    let mut points = Vec::with_capacity(disks.len() * 4);
    for disk in disks {
        for (direction, bytes, operations) in [
            ("read", disk.read_bytes, disk.reads),
            ("write", disk.written_bytes, disk.writes),
        ] {
            let attributes = Attributes::new()
                .with("device", disk.device.as_str())
                .with("direction", direction);
            points.push((
                MetricRecord::counter("system.disk.io", to_i64(bytes)).with_unit("By"),
                attributes.clone(),
            ));
            points.push((
                MetricRecord::counter("system.disk.operations", to_i64(operations))
                    .with_unit("{operation}"),
                attributes,
            ));
        }
    }
    Ok(points)
}

/// `system.filesystem.usage` by state and `system.filesystem.utilization`
/// per mountpoint.
pub fn filesystem() -> Result<Vec<Point>, ScrapeError> {
    let disks = Disks::new_with_refreshed_list();
    let mut points = Vec::new();
    for disk in disks.list() {
        let total = disk.total_space();
        if total == 0 {
            continue;
        }
        let free = disk.available_space();
        let used = total.saturating_sub(free);
        let attributes = Attributes::new()
            .with("mountpoint", disk.mount_point().display().to_string())
            .with("device", disk.name().to_string_lossy().into_owned())
            .with("type", disk.file_system().to_string_lossy().into_owned());

        points.push((
            up_down("system.filesystem.usage", used).with_unit("By"),
            attributes.clone().with("state", "used"),
        ));
        points.push((
            up_down("system.filesystem.usage", free).with_unit("By"),
            attributes.clone().with("state", "free"),
        ));
        points.push((
            MetricRecord::gauge("system.filesystem.utilization", ratio(used, total))
                .with_unit("1"),
            attributes,
        ));
    }
    Ok(points)
}

/// `system.network.io` and `system.network.packets` per interface and
/// direction.
pub fn network() -> Result<Vec<Point>, ScrapeError> {
    let networks = Networks::new_with_refreshed_list();
    let mut points = Vec::new();
    for (interface, data) in &networks {
        for (direction, bytes, packets) in [
            (
                "receive",
                data.total_received(),
                data.total_packets_received(),
            ),
            (
                "transmit",
                data.total_transmitted(),
                data.total_packets_transmitted(),
            ),
        ] {
            let attributes = Attributes::new()
                .with("device", interface.as_str())
                .with("direction", direction);
            points.push((
                MetricRecord::counter("system.network.io", to_i64(bytes)).with_unit("By"),
                attributes.clone(),
            ));
            points.push((
                MetricRecord::counter("system.network.packets", to_i64(packets))
                    .with_unit("{packet}"),
                attributes,
            ));
        }
    }
    Ok(points)
}

/// `system.cpu.load_average.{1m,5m,15m}`.
pub fn load() -> Result<Vec<Point>, ScrapeError> {
    if cfg!(windows) {
        return Err(ScrapeError::Unsupported("load average"));
    }
    let load = System::load_average();
    Ok([
        ("system.cpu.load_average.1m", load.one),
        ("system.cpu.load_average.5m", load.five),
        ("system.cpu.load_average.15m", load.fifteen),
    ]
    .into_iter()
    .map(|(name, value)| {
        (
            MetricRecord::gauge(name, value).with_unit("{thread}"),
            Attributes::new(),
        )
    })
    .collect())
}

/// `system.processes.count`.
pub fn processes(system: &mut System) -> Result<Vec<Point>, ScrapeError> {
    system.refresh_processes(ProcessesToUpdate::All, true);
    let count = system.processes().len();
    if count == 0 {
        return Err(ScrapeError::Unsupported("process table"));
    }
    let count = u64::try_from(count).unwrap_or(u64::MAX);
    Ok(vec![(
        up_down("system.processes.count", count).with_unit("{process}"),
        Attributes::new(),
    )])
}
