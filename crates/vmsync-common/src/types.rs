use serde::{Deserialize, Serialize};

/// Normalised VM power state.
///
/// Raw remote values (`PowerState/running`, `running`, `VM deallocated`, ...)
/// collapse into this closed set. Anything unrecognised is `Unknown`.
///
/// # Examples
///
/// ```
/// use vmsync_common::types::PowerState;
///
/// assert_eq!(PowerState::from_raw("PowerState/deallocated"), PowerState::Deallocated);
/// assert_eq!(PowerState::from_raw("VM running"), PowerState::Running);
/// assert_eq!(PowerState::from_raw("hibernated"), PowerState::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Running,
    Stopped,
    Deallocated,
    Starting,
    Stopping,
    Deallocating,
    #[default]
    Unknown,
}

impl PowerState {
    pub fn from_raw(raw: &str) -> Self {
        let value = raw.trim();
        let value = value
            .strip_prefix("PowerState/")
            .or_else(|| value.strip_prefix("VM "))
            .unwrap_or(value);
        match value.to_ascii_lowercase().as_str() {
            "running" => PowerState::Running,
            "stopped" => PowerState::Stopped,
            "deallocated" => PowerState::Deallocated,
            "starting" => PowerState::Starting,
            "stopping" => PowerState::Stopping,
            "deallocating" => PowerState::Deallocating,
            _ => PowerState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Running => "running",
            PowerState::Stopped => "stopped",
            PowerState::Deallocated => "deallocated",
            PowerState::Starting => "starting",
            PowerState::Stopping => "stopping",
            PowerState::Deallocating => "deallocating",
            PowerState::Unknown => "unknown",
        }
    }

    /// Stopped and deallocated both count as "not running" in VM stats.
    pub fn is_stopped(&self) -> bool {
        matches!(self, PowerState::Stopped | PowerState::Deallocated)
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PowerState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PowerState::from_raw(s))
    }
}

/// Data disk attached to a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDisk {
    pub name: String,
    pub size_gb: i32,
    pub lun: i32,
    pub storage_account_type: String,
}

/// Account-level health flag written by every sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Normal,
    Error,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Normal => "normal",
            SubscriptionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(SubscriptionStatus::Normal),
            "error" => Ok(SubscriptionStatus::Error),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

/// Best-effort subscription offer label inferred from the quota id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SubscriptionType {
    Student,
    FreeTrial,
    PayAsYouGo,
    #[serde(rename = "MSDN")]
    Msdn,
    #[default]
    Other,
}

impl SubscriptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::Student => "Student",
            SubscriptionType::FreeTrial => "FreeTrial",
            SubscriptionType::PayAsYouGo => "PayAsYouGo",
            SubscriptionType::Msdn => "MSDN",
            SubscriptionType::Other => "Other",
        }
    }
}

impl std::fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Student" => SubscriptionType::Student,
            "FreeTrial" => SubscriptionType::FreeTrial,
            "PayAsYouGo" => SubscriptionType::PayAsYouGo,
            "MSDN" => SubscriptionType::Msdn,
            _ => SubscriptionType::Other,
        })
    }
}

/// VM totals returned by a VM sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncStats {
    pub total_vms: usize,
    pub running_vms: usize,
    pub stopped_vms: usize,
}

impl SyncStats {
    pub fn from_power_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = PowerState>,
    {
        states
            .into_iter()
            .fold(SyncStats::default(), |mut stats, state| {
                stats.total_vms += 1;
                if state == PowerState::Running {
                    stats.running_vms += 1;
                } else if state.is_stopped() {
                    stats.stopped_vms += 1;
                }
                stats
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSyncSuccess {
    pub account_id: String,
    pub message: String,
    pub subscription_count: usize,
    pub vm_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSyncFailure {
    pub account_id: String,
    pub message: String,
}

/// Aggregated outcome of a multi-account sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncReport {
    pub successes: Vec<AccountSyncSuccess>,
    pub failures: Vec<AccountSyncFailure>,
}

impl SyncReport {
    pub fn is_fully_successful(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Offset pagination shared by the read-side list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_unrecognised_power_state_to_unknown() {
        assert_eq!(PowerState::from_raw(""), PowerState::Unknown);
        assert_eq!(PowerState::from_raw("PowerState/frozen"), PowerState::Unknown);
        assert_eq!(PowerState::from_raw("PowerState/STOPPING"), PowerState::Stopping);
    }

    #[test]
    fn should_count_deallocated_as_stopped_in_stats() {
        let stats = SyncStats::from_power_states([
            PowerState::Running,
            PowerState::Deallocated,
            PowerState::Stopped,
            PowerState::Starting,
        ]);
        assert_eq!(stats.total_vms, 4);
        assert_eq!(stats.running_vms, 1);
        assert_eq!(stats.stopped_vms, 2);
    }

    #[test]
    fn should_round_trip_subscription_type_labels() {
        for kind in [
            SubscriptionType::Student,
            SubscriptionType::FreeTrial,
            SubscriptionType::PayAsYouGo,
            SubscriptionType::Msdn,
            SubscriptionType::Other,
        ] {
            let parsed: SubscriptionType = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
