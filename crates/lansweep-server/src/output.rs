//! Output formatting for one-shot commands.

use colored::*;
use comfy_table::{Cell, ContentArrangement, Table};
use lansweep_core::probe::ProbeReport;
use lansweep_core::types::Device;

/// Format a device list as a table or JSON.
pub fn format_devices(devices: &[Device], json: bool) -> String {
    if json {
        let output = serde_json::json!({
            "devices": devices,
            "count": devices.len(),
        });
        return serde_json::to_string_pretty(&output).unwrap_or_default();
    }

    if devices.is_empty() {
        return "No devices found.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "IP", "Hostname", "Alias", "RTT", "Last seen"]);

    for device in devices {
        table.add_row(vec![
            Cell::new(device.id.to_string()),
            Cell::new(&device.ip),
            Cell::new(device.hostname.as_deref().unwrap_or("-")),
            Cell::new(device.alias.as_deref().unwrap_or("-")),
            Cell::new(
                device
                    .rtt
                    .map(|ms| format!("{} ms", ms))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                device
                    .last_seen
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            ),
        ]);
    }

    format!("{}\n\nFound {} device(s)", table, devices.len())
}

/// Format a single-address probe outcome.
pub fn format_ping(ip: &str, report: &ProbeReport, json: bool) -> String {
    if json {
        let output = serde_json::json!({
            "ip": ip,
            "alive": report.alive,
            "rtt": report.rtt_ms,
        });
        return serde_json::to_string_pretty(&output).unwrap_or_default();
    }

    if report.alive {
        let rtt = report
            .rtt_ms
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_else(|| "unknown rtt".to_string());
        format!("{} {} ({})", ip, "reachable".green(), rtt)
    } else {
        format!("{} {}", ip, "unreachable".red())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty_device_list() {
        assert_eq!(format_devices(&[], false), "No devices found.");
    }

    #[test]
    fn test_format_devices_json_shape() {
        let devices = vec![Device {
            id: 1,
            ip: "10.0.0.1".to_string(),
            hostname: None,
            alias: None,
            rtt: Some(2),
            last_seen: None,
        }];
        let out = format_devices(&devices, true);
        assert!(out.contains("\"count\": 1"));
        assert!(out.contains("10.0.0.1"));
    }

    #[test]
    fn test_format_ping_json_includes_null_rtt() {
        let out = format_ping("10.0.0.9", &ProbeReport::unreachable(), true);
        assert!(out.contains("\"alive\": false"));
        assert!(out.contains("\"rtt\": null"));
    }
}
