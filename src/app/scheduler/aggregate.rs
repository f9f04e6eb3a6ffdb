//! Propagation of the representative's results to the rest of an endpoint

use crate::app::diagnostics::Diagnostic;
use crate::app::models::{CheckState, Endpoint, PollState, QuotaSetting, Share};
use crate::constants::quota;
use crate::errors::StatsError;

/// Copy the representative's results to every other share
///
/// Runs whatever became of the representative: polled, skipped with cached
/// values or failed. Usage always follows the representative; quota and free
/// space follow it only for shares that take their quota from the backend.
/// The representative's diagnostics are appended after each share's own,
/// skipping ones the share already carries.
pub fn aggregate(endpoint: &mut Endpoint) {
    let Some((representative, others)) = endpoint.shares.split_first_mut() else {
        return;
    };

    for share in others {
        share.stats.file_count = representative.stats.file_count;
        share.stats.bytes_used = representative.stats.bytes_used;
        share.stats.start_time = representative.stats.start_time;
        share.stats.end_time = representative.stats.end_time;

        match share.quota_setting() {
            QuotaSetting::Api => {
                share.stats.quota = representative.stats.quota;
                share.stats.bytes_free = representative.stats.bytes_free;
            }
            QuotaSetting::Bytes(local) => {
                share.stats.quota = local;
                share.stats.bytes_free = if share.stats.bytes_used < 0 {
                    quota::UNKNOWN
                } else {
                    local - share.stats.bytes_used
                };
            }
        }

        for diagnostic in &representative.diagnostics {
            if !share.diagnostics.contains(diagnostic) {
                share.diagnostics.push(diagnostic.clone());
            }
        }

        if share.check.is_ok() {
            share.poll_state = representative.poll_state;
        } else {
            skip(share);
        }
    }
}

/// Mark a share that will not be polled, flagging offline endpoints
pub fn skip(share: &mut Share) {
    if share.check == CheckState::Offline {
        share.push_diagnostic(Diagnostic::from(&StatsError::EndpointOffline));
    }
    share.poll_state = PollState::Skipped(share.check);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{group_by_url, SettingValue, ShareSpec};

    fn share(id: &str) -> Share {
        Share::from_spec(
            &ShareSpec::new(id, "https://a.example.org/", "libugrlocplugin_s3.so"),
            100,
        )
    }

    fn polled_endpoint(others: Vec<Share>) -> Endpoint {
        let mut representative = share("rep");
        representative.stats.bytes_used = 400;
        representative.stats.file_count = 4;
        representative.stats.quota = 1000;
        representative.stats.bytes_free = 600;
        representative.stats.end_time = 200;
        representative.poll_state = PollState::SucceededWithWarning;
        representative.push_diagnostic(Diagnostic::warning("NoQuotaGiven", "098", "defaulted"));

        let mut shares = vec![representative];
        shares.extend(others);
        group_by_url(shares).remove(0)
    }

    /// Test that every share of an endpoint reports the same usage.
    ///
    /// Purpose: bytes_used and file_count are properties of the storage, not the share.
    /// Benefit: Shares aliasing one bucket never disagree in reports.
    #[test]
    fn test_usage_is_identical_across_endpoint() {
        let mut local = share("local");
        local
            .settings
            .insert("storagestats.quota".into(), SettingValue::Int(500));
        let mut endpoint = polled_endpoint(vec![share("api"), local]);

        aggregate(&mut endpoint);

        for s in &endpoint.shares {
            assert_eq!(s.stats.bytes_used, 400);
            assert_eq!(s.stats.file_count, 4);
            assert_eq!(s.stats.end_time, 200);
        }

        let api = &endpoint.shares[1];
        assert_eq!((api.stats.quota, api.stats.bytes_free), (1000, 600));
        assert_eq!(api.status(), "[WARNING][NoQuotaGiven][098]");
        assert_eq!(api.poll_state, PollState::SucceededWithWarning);

        let local = &endpoint.shares[2];
        assert_eq!((local.stats.quota, local.stats.bytes_free), (500, 100));
    }

    #[test]
    fn test_own_diagnostics_come_first_without_duplicates() {
        let missing = Diagnostic::warning("MissingSetting", "005", "defaulted");
        let mut representative = share("rep");
        representative.push_diagnostic(missing.clone());
        representative.push_diagnostic(Diagnostic::error("ConnectionError", "400", "refused"));
        representative.poll_state = PollState::Failed;

        let mut other = share("other");
        other.push_diagnostic(missing);
        let mut endpoint = group_by_url(vec![representative, other]).remove(0);

        aggregate(&mut endpoint);
        assert_eq!(
            endpoint.shares[1].status(),
            "[WARNING][MissingSetting][005],[ERROR][ConnectionError][400]"
        );
        assert_eq!(endpoint.shares[1].poll_state, PollState::Failed);
    }

    /// Test an endpoint whose representative was served from the cache
    ///
    /// Purpose: Siblings take the cached usage and timestamp of the
    /// representative instead of keeping unknown values.
    /// Benefit: A sibling stored after this run is never written with -1
    /// usage and a fresh timestamp.
    #[test]
    fn test_skipped_representative_shares_cached_values() {
        let mut representative = share("rep");
        representative.check = CheckState::PeriodNotReached;
        representative.stats.start_time = 50;
        representative.stats.bytes_used = 5;
        representative.stats.bytes_free = 95;
        representative.stats.quota = 100;
        skip(&mut representative);

        let mut offline = share("offline");
        offline.check = CheckState::Offline;
        let mut endpoint = group_by_url(vec![representative, share("ok"), offline]).remove(0);

        aggregate(&mut endpoint);

        let ok = &endpoint.shares[1];
        assert_eq!(ok.poll_state, PollState::Skipped(CheckState::PeriodNotReached));
        assert_eq!(ok.stats.bytes_used, 5);
        assert_eq!(ok.stats.bytes_free, 95);
        assert_eq!(ok.stats.start_time, 50);

        let offline = &endpoint.shares[2];
        assert_eq!(offline.poll_state, PollState::Skipped(CheckState::Offline));
        assert_eq!(offline.status(), "[ERROR][EndpointOffline][400]");
        assert_eq!(offline.stats.bytes_used, 5);
    }
}
