//! Per-component health state and the derived overall status

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Status of a single component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    #[default]
    Unknown,
    Healthy,
    Warning,
    Error,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Status derived from every component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// No component has reported since start or reset
    #[default]
    Starting,
    Healthy,
    Warning,
    Error,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// `error` if any component is in error, `healthy` if all are healthy,
/// `warning` otherwise.
pub fn derive_overall<I>(statuses: I) -> OverallStatus
where
    I: IntoIterator<Item = ComponentStatus>,
{
    let mut all_healthy = true;
    for status in statuses {
        match status {
            ComponentStatus::Error => return OverallStatus::Error,
            ComponentStatus::Healthy => {}
            ComponentStatus::Unknown | ComponentStatus::Warning => all_healthy = false,
        }
    }
    if all_healthy {
        OverallStatus::Healthy
    } else {
        OverallStatus::Warning
    }
}

/// Last reported state of one component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub details: Value,
    /// Unix epoch milliseconds of the last update
    pub last_update: Option<i64>,
}

/// Health section of a metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub last_check: Option<i64>,
    pub status: OverallStatus,
    pub components: BTreeMap<String, ComponentStatus>,
}

/// Detailed health view: overall status plus every component's last report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: OverallStatus,
    pub last_check: Option<i64>,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Outcome of a single [`HealthAggregator::update`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthChange {
    pub component: String,
    pub status: ComponentStatus,
    pub overall: OverallStatus,
    pub details: Value,
}

/// Tracks every component and keeps the overall status current
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    components: BTreeMap<String, ComponentHealth>,
    overall: OverallStatus,
    last_check: Option<i64>,
}

impl HealthAggregator {
    /// Start with the given components in `unknown`
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components
                .into_iter()
                .map(|name| (name.into(), ComponentHealth::default()))
                .collect(),
            overall: OverallStatus::Starting,
            last_check: None,
        }
    }

    /// Set a component's status and recompute the overall status
    pub fn update(
        &mut self,
        component: &str,
        status: ComponentStatus,
        details: Value,
        now_ms: i64,
    ) -> HealthChange {
        let entry = self.components.entry(component.to_string()).or_default();
        entry.status = status;
        entry.details = details.clone();
        entry.last_update = Some(now_ms);

        self.last_check = Some(now_ms);
        self.overall = derive_overall(self.components.values().map(|c| c.status));

        HealthChange {
            component: component.to_string(),
            status,
            overall: self.overall,
            details,
        }
    }

    pub fn overall(&self) -> OverallStatus {
        self.overall
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.get(name)
    }

    pub fn components(&self) -> &BTreeMap<String, ComponentHealth> {
        &self.components
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: self.overall,
            last_check: self.last_check,
            components: self.components.clone(),
        }
    }

    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            last_check: self.last_check,
            status: self.overall,
            components: self
                .components
                .iter()
                .map(|(name, health)| (name.clone(), health.status))
                .collect(),
        }
    }
}
