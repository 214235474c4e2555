//! Scanner agent fleet

use crate::error::{optional_text, require_text, ValidationError};
use crate::permission::Permission;
use crate::query::{
    facet_matches, text_matches, PageRequest, QueryParams, ResourceFilter, SortKey, SortSpec,
};
use crate::resource::{Envelope, Resource, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health reported by the fleet monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Heartbeating normally
    Online,
    /// Heartbeats late or resource pressure
    Degraded,
    /// No heartbeat
    Offline,
}

impl AgentStatus {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Degraded => "degraded",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployed agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Opaque identifier
    pub id: String,
    /// Host name
    pub hostname: String,
    /// Primary address
    pub ip_address: String,
    /// Operating system
    pub os: String,
    /// Agent build
    pub version: String,
    /// Health
    pub status: AgentStatus,
    /// Owning business unit
    pub business_unit: Option<String>,
    /// CPU usage percentage
    pub cpu_usage: f64,
    /// Memory usage percentage
    pub memory_usage: f64,
    /// Last heartbeat
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

/// Filter object for `GET /agents`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentFilters {
    /// Substring of hostname or address
    pub search: Option<String>,
    /// Any of these health states
    pub status: Vec<AgentStatus>,
    /// Exact business unit
    pub business_unit: Option<String>,
    /// Page selection
    pub page: PageRequest,
    /// Ordering
    pub sort: Option<SortSpec>,
}

impl ResourceFilter<Agent> for AgentFilters {
    fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_opt("search", self.search.as_deref());
        params.push_list("status", &self.status);
        params.push_opt("business_unit", self.business_unit.as_deref());
        self.page.write(&mut params);
        SortSpec::write(self.sort.as_ref(), &mut params);
        params
    }

    fn matches(&self, agent: &Agent) -> bool {
        let unit_ok = match &self.business_unit {
            Some(unit) => agent.business_unit.as_deref() == Some(unit.as_str()),
            None => true,
        };
        unit_ok
            && text_matches(
                self.search.as_deref(),
                &[agent.hostname.as_str(), agent.ip_address.as_str()],
            )
            && facet_matches(&self.status, &agent.status)
    }

    fn page(&self) -> PageRequest {
        self.page
    }

    fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }
}

/// Manual agent registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgentInput {
    /// Host name
    pub hostname: String,
    /// Primary address
    pub ip_address: String,
    /// Operating system
    pub os: String,
    /// Owning business unit
    pub business_unit: Option<String>,
}

/// Wire payload for `POST /agents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterAgentPayload {
    /// Host name
    pub hostname: String,
    /// Primary address
    pub ip_address: String,
    /// Operating system
    pub os: String,
    /// Owning business unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_unit: Option<String>,
}

impl Validate for RegisterAgentInput {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("hostname", &self.hostname, 253)?;
        require_text("ipAddress", &self.ip_address, 45)?;
        if self.ip_address.trim().parse::<std::net::IpAddr>().is_err() {
            return Err(ValidationError::new("ipAddress", "must be an IP address"));
        }
        require_text("os", &self.os, 64)
    }
}

impl Envelope for RegisterAgentInput {
    type Wire = RegisterAgentPayload;

    fn to_wire(&self) -> Self::Wire {
        RegisterAgentPayload {
            hostname: self.hostname.trim().to_string(),
            ip_address: self.ip_address.trim().to_string(),
            os: self.os.clone(),
            business_unit: self.business_unit.clone(),
        }
    }
}

/// Agent reassignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentInput {
    /// New business unit
    pub business_unit: Option<String>,
}

/// Wire payload for `PUT /agents/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAgentPayload {
    /// New business unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_unit: Option<String>,
}

impl Validate for UpdateAgentInput {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("businessUnit", self.business_unit.as_deref(), 100)
    }
}

impl Envelope for UpdateAgentInput {
    type Wire = UpdateAgentPayload;

    fn to_wire(&self) -> Self::Wire {
        UpdateAgentPayload {
            business_unit: self.business_unit.clone(),
        }
    }
}

/// Marker for the agent resource
#[derive(Debug, Clone, Copy)]
pub struct Agents;

impl Resource for Agents {
    const NAMESPACE: &'static str = "agents";
    const LABEL: &'static str = "Agent";
    const READ: Permission = Permission::AgentsRead;
    const WRITE: Permission = Permission::AgentsWrite;

    type Record = Agent;
    type Filters = AgentFilters;
    type Create = RegisterAgentInput;
    type Update = UpdateAgentInput;

    fn id(record: &Agent) -> &str {
        &record.id
    }

    fn sort_key(record: &Agent, field: &str) -> Option<SortKey> {
        match field {
            "hostname" => Some(SortKey::Text(record.hostname.clone())),
            "cpu_usage" => Some(SortKey::Number(record.cpu_usage)),
            "memory_usage" => Some(SortKey::Number(record.memory_usage)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_bad_address() {
        let input = RegisterAgentInput {
            hostname: "scanner-eu-1".into(),
            ip_address: "10.0.0".into(),
            os: "linux".into(),
            business_unit: None,
        };
        assert_eq!(input.validate().unwrap_err().field, "ipAddress");
    }

    #[test]
    fn search_covers_address() {
        let filters = AgentFilters {
            search: Some("10.20".into()),
            ..Default::default()
        };
        let agent = Agent {
            id: "agt-1".into(),
            hostname: "scanner-eu-1".into(),
            ip_address: "10.20.0.4".into(),
            os: "linux".into(),
            version: "2.4.1".into(),
            status: AgentStatus::Online,
            business_unit: None,
            cpu_usage: 12.0,
            memory_usage: 40.0,
            last_heartbeat_at: None,
        };
        assert!(filters.matches(&agent));
    }
}
