//! Per-share reports and their renderers
//!
//! Renderers only see [`ShareReport`]s, never shares, and return strings;
//! writing them anywhere is up to the caller.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::app::models::{Endpoint, Share};

/// Reported state of one share
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareReport {
    pub id: String,
    pub url: String,
    pub protocol: String,
    pub start_time: i64,
    pub quota: i64,
    pub bytes_used: i64,
    pub bytes_free: i64,
    pub file_count: i64,
    pub status: String,
    /// Federation path the share is mounted at (`xlatepfx`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    #[serde(skip)]
    pub debug: Vec<String>,
}

impl ShareReport {
    pub fn from_share(share: &Share) -> Self {
        let mount_point = share
            .text("xlatepfx")
            .split_whitespace()
            .next()
            .map(str::to_string);

        Self {
            id: share.id.clone(),
            url: share.uri.url.clone(),
            protocol: share.protocol_name().to_string(),
            start_time: share.stats.start_time,
            quota: share.stats.quota,
            bytes_used: share.stats.bytes_used,
            bytes_free: share.stats.bytes_free,
            file_count: share.stats.file_count,
            status: share.status(),
            mount_point,
            debug: share.debug_lines(),
        }
    }
}

/// Reports for every share, in endpoint order
pub fn collect(endpoints: &[Endpoint]) -> Vec<ShareReport> {
    endpoints
        .iter()
        .flat_map(|endpoint| endpoint.shares.iter())
        .map(ShareReport::from_share)
        .collect()
}

/// Human readable block per share
pub fn to_stdout(reports: &[ShareReport], debug: bool) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "\n##### {} #####", report.id);
        let rows = [
            ("URL:", report.url.clone()),
            ("Protocol:", report.protocol.clone()),
            ("Time:", report.start_time.to_string()),
            ("Quota:", report.quota.to_string()),
            ("Bytes Used:", report.bytes_used.to_string()),
            ("Bytes Free:", report.bytes_free.to_string()),
            ("FileCount:", report.file_count.to_string()),
            ("Status:", report.status.clone()),
        ];
        for (label, value) in rows {
            let _ = writeln!(out, "{:<12}{}", label, value);
        }

        if debug && !report.debug.is_empty() {
            let _ = writeln!(out, "\nDebug:");
            for line in &report.debug {
                let _ = writeln!(out, "{:<12}{}", "", line);
            }
        }
    }
    out
}

/// Space separated table, one row per share
pub fn to_plaintext(reports: &[ShareReport]) -> String {
    let mut out = String::from("ID URL MountPoint Protocol Timestamp Quota BytesUsed BytesFree FileCount\n");
    for r in reports {
        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {} {} {}",
            r.id,
            r.url,
            r.mount_point.as_deref().unwrap_or("-"),
            r.protocol,
            r.start_time,
            r.quota,
            r.bytes_used,
            r.bytes_free,
            r.file_count
        );
    }
    out
}

#[derive(Debug, Serialize)]
struct Capacity {
    totalsize: i64,
    usedsize: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    numberoffiles: Option<i64>,
}

#[derive(Debug, Serialize)]
struct StorageEndpoint<'a> {
    name: &'a str,
    endpointurl: &'a str,
    interfacetype: &'a str,
    timestamp: i64,
    capacity: Capacity,
    assignedshares: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct StorageShare<'a> {
    path: &'a str,
    totalsize: i64,
    usedsize: i64,
    assignedendpoints: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct StorageService<'a> {
    name: &'a str,
    implementation: &'static str,
    latestupdate: i64,
    storageservicecapacity: Capacity,
    storageendpoints: Vec<StorageEndpoint<'a>>,
    storageshares: Vec<StorageShare<'a>>,
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    storageservice: StorageService<'a>,
}

/// WLCG-style storage service description
///
/// Shares are grouped into storage shares by mount point; shares without one
/// are grouped under `/`.
pub fn to_json(reports: &[ShareReport], hostname: &str, now: i64) -> serde_json::Result<String> {
    let mut shares: BTreeMap<&str, StorageShare<'_>> = BTreeMap::new();
    let mut endpoints = Vec::with_capacity(reports.len());
    let (mut total, mut used) = (0i64, 0i64);

    for r in reports {
        let path = r.mount_point.as_deref().unwrap_or("/");
        total += r.quota.max(0);
        used += r.bytes_used.max(0);

        endpoints.push(StorageEndpoint {
            name: &r.id,
            endpointurl: &r.url,
            interfacetype: &r.protocol,
            timestamp: r.start_time,
            capacity: Capacity {
                totalsize: r.quota,
                usedsize: r.bytes_used,
                numberoffiles: Some(r.file_count),
            },
            assignedshares: vec![path],
        });

        let share = shares.entry(path).or_insert_with(|| StorageShare {
            path,
            totalsize: 0,
            usedsize: 0,
            assignedendpoints: Vec::new(),
        });
        share.totalsize += r.quota.max(0);
        share.usedsize += r.bytes_used.max(0);
        share.assignedendpoints.push(&r.id);
    }

    let document = Document {
        storageservice: StorageService {
            name: hostname,
            implementation: "dynafed",
            latestupdate: now,
            storageservicecapacity: Capacity {
                totalsize: total,
                usedsize: used,
                numberoffiles: None,
            },
            storageendpoints: endpoints,
            storageshares: shares.into_values().collect(),
        },
    };

    serde_json::to_string_pretty(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn report(id: &str, mount: Option<&str>, quota: i64, used: i64) -> ShareReport {
        ShareReport {
            id: id.into(),
            url: format!("https://{}.example.org/", id),
            protocol: "S3".into(),
            start_time: 1_700_000_000,
            quota,
            bytes_used: used,
            bytes_free: quota - used,
            file_count: 3,
            status: "[OK][OK][200]".into(),
            mount_point: mount.map(str::to_string),
            debug: vec!["[WARNING][MissingSetting][005]defaulted".into()],
        }
    }

    #[test]
    fn test_stdout_layout() {
        let out = to_stdout(&[report("a", None, 100, 40)], false);
        assert!(out.contains("##### a #####"));
        assert!(out.contains("Bytes Used: 40"));
        assert!(out.contains("Status:     [OK][OK][200]"));
        assert!(!out.contains("Debug:"));

        let out = to_stdout(&[report("a", None, 100, 40)], true);
        assert!(out.contains("Debug:"));
    }

    #[test]
    fn test_plaintext_rows() {
        let out = to_plaintext(&[report("a", Some("/data"), 100, 40)]);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "a https://a.example.org/ /data S3 1700000000 100 40 60 3"
        );
    }

    #[test]
    fn test_json_groups_by_mount_point() {
        let reports = [
            report("a", Some("/data"), 100, 40),
            report("b", Some("/data"), 50, 10),
            report("c", None, 10, 1),
        ];
        let doc: Value = serde_json::from_str(&to_json(&reports, "fed.example.org", 42).unwrap()).unwrap();
        let service = &doc["storageservice"];

        assert_eq!(service["name"], "fed.example.org");
        assert_eq!(service["latestupdate"], 42);
        assert_eq!(service["storageservicecapacity"]["totalsize"], 160);
        assert_eq!(service["storageendpoints"].as_array().unwrap().len(), 3);

        let shares = service["storageshares"].as_array().unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[1]["path"], "/data");
        assert_eq!(shares[1]["usedsize"], 50);
        assert_eq!(shares[1]["assignedendpoints"], serde_json::json!(["a", "b"]));
    }
}
