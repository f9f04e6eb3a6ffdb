//! Share setting validation
//!
//! Validation turns a raw [`ShareSpec`] into a [`Share`] with typed settings,
//! checking each setting against the protocol's [`Schema`].
//!
//! # Key Features
//!
//! - **Defaults**: Missing optional settings take the schema default and leave
//!   a warning diagnostic on the share
//! - **Soft failures**: Missing required settings and invalid values mark the
//!   share unusable through its [`CheckState`] instead of failing the run
//! - **Typing**: Boolean flags and integers are converted once, here
//! - **Quota literals**: Sizes such as `10TB` or `500GiB` become byte counts;
//!   a malformed literal is the one fatal validation error
//!
//! # Module Organization
//!
//! - [`schema`] - Setting rules and schema composition
//! - [`units`] - Size literal conversion

pub mod schema;
pub mod units;

pub use schema::{Schema, SettingKind, SettingRule};
pub use units::convert_size_to_bytes;

use tracing::debug;

use crate::app::diagnostics::Diagnostic;
use crate::app::models::{CheckState, SettingValue, Share, ShareSpec};
use crate::constants::quota;
use crate::errors::{ConfigError, ConfigResult, SettingError};

/// Validate a share declaration against a schema
///
/// Setting problems are recorded as diagnostics and reflected in the share's
/// check state. Only a malformed quota literal returns an error.
pub fn validate(spec: &ShareSpec, schema: &Schema, now: i64) -> ConfigResult<Share> {
    let mut share = Share::from_spec(spec, now);
    debug!("[{}] Validating configured settings", share.id);

    share
        .settings
        .insert("url".to_string(), SettingValue::Text(spec.url.clone()));

    for rule in schema.rules() {
        let value = match spec.settings.get(rule.name) {
            None if rule.required => {
                let err = SettingError::MissingRequired {
                    setting: rule.name.to_string(),
                };
                mark(&mut share, CheckState::MissingRequiredSetting);
                share.push_diagnostic(Diagnostic::from_setting(&err, rule.status_code));
                SettingValue::Text(String::new())
            }
            None => {
                let default = rule.default.unwrap_or_default();
                let err = SettingError::Missing {
                    setting: rule.name.to_string(),
                    default: default.to_string(),
                };
                share.push_diagnostic(Diagnostic::from_setting(&err, rule.status_code));
                typed_value(rule, default).unwrap_or_else(|_| SettingValue::Text(default.to_string()))
            }
            Some(raw) => match typed_value(rule, raw) {
                Ok(value) => value,
                Err(err) => {
                    mark(&mut share, CheckState::InvalidSetting);
                    share.push_diagnostic(Diagnostic::from_setting(&err, rule.status_code));
                    SettingValue::Text(raw.clone())
                }
            },
        };
        share.settings.insert(rule.name.to_string(), value);
    }

    for (name, raw) in &spec.settings {
        if schema.get(name).is_none() {
            share
                .settings
                .insert(name.clone(), SettingValue::Text(raw.clone()));
        }
    }

    apply_ca_bundle(&mut share);
    convert_quota(&mut share)?;

    Ok(share)
}

/// Keep the first reason a share became unusable
fn mark(share: &mut Share, state: CheckState) {
    if share.check.is_ok() {
        share.check = state;
    }
}

fn typed_value(rule: &SettingRule, raw: &str) -> Result<SettingValue, SettingError> {
    if !rule.accepts(raw) {
        return Err(SettingError::NotInValidSet {
            setting: rule.name.to_string(),
            value: raw.to_string(),
            valid: rule
                .valid
                .iter()
                .flatten()
                .map(|v| v.to_string())
                .collect(),
        });
    }

    if rule.boolean {
        let off = raw.eq_ignore_ascii_case("false") || raw.eq_ignore_ascii_case("no");
        return Ok(SettingValue::Bool(!off));
    }

    match rule.kind {
        SettingKind::Int => raw
            .trim()
            .parse()
            .map(SettingValue::Int)
            .map_err(|_| SettingError::NotAnInteger {
                setting: rule.name.to_string(),
                value: raw.to_string(),
            }),
        SettingKind::Text => Ok(SettingValue::Text(raw.to_string())),
    }
}

/// A verified-TLS share with `ca_path` set verifies against that bundle
fn apply_ca_bundle(share: &mut Share) {
    let verify = share.flag("ssl_check");
    let ca_path = share.text("ca_path").to_string();
    if verify && !ca_path.is_empty() {
        share
            .settings
            .insert("ssl_check".to_string(), SettingValue::Text(ca_path));
    }
}

fn convert_quota(share: &mut Share) -> ConfigResult<()> {
    let Some(SettingValue::Text(raw)) = share.setting("storagestats.quota").cloned() else {
        return Ok(());
    };
    if raw.eq_ignore_ascii_case(quota::API) {
        return Ok(());
    }

    let bytes = convert_size_to_bytes(&raw).ok_or_else(|| ConfigError::MalformedQuota {
        share_id: share.id.clone(),
        value: raw.clone(),
    })?;
    share
        .settings
        .insert("storagestats.quota".to_string(), SettingValue::Int(bytes));
    Ok(())
}
