//! Setting rules and per-protocol schemas

use crate::constants::{defaults, quota};

/// How a present value is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    Int,
}

/// Validation rule for one setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRule {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    pub valid: Option<Vec<&'static str>>,
    pub boolean: bool,
    pub kind: SettingKind,
    pub status_code: &'static str,
}

impl SettingRule {
    /// Setting that must be present
    pub fn required(name: &'static str, status_code: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            valid: None,
            boolean: false,
            kind: SettingKind::Text,
            status_code,
        }
    }

    /// Setting that falls back to a default
    pub fn optional(name: &'static str, default: &'static str, status_code: &'static str) -> Self {
        Self {
            required: false,
            default: Some(default),
            ..Self::required(name, status_code)
        }
    }

    /// Restrict values to a set, compared case-insensitively
    pub fn one_of(mut self, valid: &[&'static str]) -> Self {
        self.valid = Some(valid.to_vec());
        self
    }

    /// Interpret the value as a yes/no flag
    pub fn boolean(mut self) -> Self {
        self.boolean = true;
        self
    }

    /// Require an integer value
    pub fn int(mut self) -> Self {
        self.kind = SettingKind::Int;
        self
    }

    pub fn accepts(&self, value: &str) -> bool {
        match &self.valid {
            Some(valid) => valid.iter().any(|v| v.eq_ignore_ascii_case(value)),
            None => true,
        }
    }
}

/// Ordered set of setting rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    rules: Vec<SettingRule>,
}

impl Schema {
    /// Rules every protocol shares, with the protocol's api default and choices
    pub fn common(api_default: &'static str, api_valid: &[&'static str]) -> Self {
        Self {
            rules: vec![
                SettingRule::optional("conn_timeout", defaults::CONN_TIMEOUT_SECS, "005").int(),
                SettingRule::optional("ssl_check", "true", "006")
                    .one_of(&["true", "false", "yes", "no"])
                    .boolean(),
                SettingRule::optional("storagestats.api", api_default, "070").one_of(api_valid),
                SettingRule::optional("storagestats.quota", quota::API, "071"),
                SettingRule::optional("storagestats.frequency", defaults::FREQUENCY_SECS, "072")
                    .int(),
            ],
        }
    }

    /// Add rules, replacing any with the same name
    pub fn extend(mut self, rules: impl IntoIterator<Item = SettingRule>) -> Self {
        for rule in rules {
            match self.rules.iter_mut().find(|r| r.name == rule.name) {
                Some(existing) => *existing = rule,
                None => self.rules.push(rule),
            }
        }
        self
    }

    pub fn rules(&self) -> &[SettingRule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&SettingRule> {
        self.rules.iter().find(|r| r.name == name)
    }
}
