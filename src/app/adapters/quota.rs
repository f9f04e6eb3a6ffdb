//! Quota finalization shared by all adapters

use tracing::debug;

use crate::app::adapters::Collected;
use crate::app::models::{now_unix, QuotaSetting, Share, StatsRecord};
use crate::constants::DEFAULT_QUOTA;
use crate::errors::StatsWarning;

/// What the backend said about the quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedQuota {
    /// Backend reported a quota in bytes
    Known(i64),
    /// Backend has no notion of a quota, or did not send one
    Missing,
    /// Ceph bucket quota exists but is disabled
    Disabled,
    /// RFC 4331 server reported zero available bytes
    ZeroAvailable,
}

/// Byte and object totals gathered from a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub bytes: i64,
    pub files: i64,
}

impl Usage {
    pub fn add(&mut self, bytes: i64) {
        self.bytes += bytes;
        self.files += 1;
    }
}

/// Build the final record for a poll
///
/// An explicit quota on the share always wins. Otherwise the reported quota
/// is used, falling back to [`DEFAULT_QUOTA`] with a warning.
pub fn finalize_quota(share: &Share, start_time: i64, usage: Usage, reported: ReportedQuota) -> Collected {
    let mut warnings = Vec::new();

    let quota = match (share.quota_setting(), reported) {
        (QuotaSetting::Bytes(bytes), _) => bytes,
        (QuotaSetting::Api, ReportedQuota::Known(bytes)) => bytes,
        (QuotaSetting::Api, ReportedQuota::Missing) => {
            warnings.push(StatsWarning::NoQuotaGiven {
                default_quota: DEFAULT_QUOTA,
            });
            DEFAULT_QUOTA
        }
        (QuotaSetting::Api, ReportedQuota::Disabled) => {
            warnings.push(StatsWarning::BucketQuotaDisabled {
                default_quota: DEFAULT_QUOTA,
            });
            DEFAULT_QUOTA
        }
        (QuotaSetting::Api, ReportedQuota::ZeroAvailable) => {
            warnings.push(StatsWarning::ZeroAvailableBytes {
                default_quota: DEFAULT_QUOTA,
            });
            DEFAULT_QUOTA
        }
    };

    let record = StatsRecord {
        bytes_used: usage.bytes,
        bytes_free: quota - usage.bytes,
        quota,
        file_count: usage.files,
        start_time,
        end_time: now_unix(),
    };

    debug!(
        "[{}] Used {} of {} bytes in {} files",
        share.id, record.bytes_used, record.quota, record.file_count
    );

    Collected { record, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{SettingValue, ShareSpec};

    fn share(quota: Option<i64>) -> Share {
        let mut share = Share::from_spec(
            &ShareSpec::new("a", "https://a.example.org/", "libugrlocplugin_s3.so"),
            10,
        );
        if let Some(bytes) = quota {
            share
                .settings
                .insert("storagestats.quota".into(), SettingValue::Int(bytes));
        }
        share
    }

    #[test]
    fn test_reported_quota_is_used() {
        let usage = Usage { bytes: 40, files: 2 };
        let collected = finalize_quota(&share(None), 10, usage, ReportedQuota::Known(100));
        assert_eq!(collected.record.quota, 100);
        assert_eq!(collected.record.bytes_free, 60);
        assert_eq!(collected.record.file_count, 2);
        assert_eq!(collected.record.start_time, 10);
        assert!(collected.record.end_time >= 10);
        assert!(collected.warnings.is_empty());
    }

    #[test]
    fn test_local_quota_wins() {
        let usage = Usage { bytes: 40, files: 2 };
        let collected = finalize_quota(&share(Some(500)), 10, usage, ReportedQuota::Disabled);
        assert_eq!(collected.record.quota, 500);
        assert_eq!(collected.record.bytes_free, 460);
        assert!(collected.warnings.is_empty());
    }

    #[test]
    fn test_missing_quota_defaults_with_warning() {
        let collected = finalize_quota(&share(None), 10, Usage::default(), ReportedQuota::Missing);
        assert_eq!(collected.record.quota, DEFAULT_QUOTA);
        assert_eq!(collected.record.bytes_used, 0);
        assert_eq!(
            collected.warnings,
            vec![StatsWarning::NoQuotaGiven {
                default_quota: DEFAULT_QUOTA
            }]
        );
    }
}
