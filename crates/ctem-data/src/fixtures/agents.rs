//! Agent fixtures

use super::days_ago;
use crate::repository::MockResource;
use chrono::{DateTime, Utc};
use ctem_model::{Agent, AgentStatus, Agents, RegisterAgentInput, UpdateAgentInput};

fn agent(
    id: &str,
    hostname: &str,
    ip_address: &str,
    os: &str,
    status: AgentStatus,
    business_unit: &str,
    usage: (f64, f64),
) -> Agent {
    Agent {
        id: id.to_string(),
        hostname: hostname.to_string(),
        ip_address: ip_address.to_string(),
        os: os.to_string(),
        version: "2.4.1".to_string(),
        status,
        business_unit: Some(business_unit.to_string()),
        cpu_usage: usage.0,
        memory_usage: usage.1,
        last_heartbeat_at: (status != AgentStatus::Offline).then(|| days_ago(0)),
    }
}

/// Seed agents
#[must_use]
pub fn agents() -> Vec<Agent> {
    vec![
        agent(
            "agt-001",
            "core-ledger-01",
            "10.0.1.15",
            "Ubuntu 22.04",
            AgentStatus::Online,
            "Finance",
            (34.5, 61.2),
        ),
        agent(
            "agt-002",
            "web-edge-03",
            "10.0.2.31",
            "Debian 12",
            AgentStatus::Online,
            "Marketing",
            (12.0, 40.8),
        ),
        agent(
            "agt-003",
            "api-staging-02",
            "10.1.4.7",
            "Amazon Linux 2023",
            AgentStatus::Degraded,
            "Engineering",
            (91.3, 88.0),
        ),
        agent(
            "agt-004",
            "ci-runner-07",
            "10.2.0.77",
            "Windows Server 2022",
            AgentStatus::Offline,
            "Engineering",
            (0.0, 0.0),
        ),
    ]
}

impl MockResource for Agents {
    const ID_PREFIX: &'static str = "agt";

    fn fixtures() -> Vec<Agent> {
        agents()
    }

    fn from_create(id: String, input: &RegisterAgentInput, _now: DateTime<Utc>) -> Agent {
        Agent {
            id,
            hostname: input.hostname.trim().to_string(),
            ip_address: input.ip_address.trim().to_string(),
            os: input.os.clone(),
            version: "unknown".to_string(),
            status: AgentStatus::Offline,
            business_unit: input.business_unit.clone(),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            last_heartbeat_at: None,
        }
    }

    fn apply_update(agent: &mut Agent, input: &UpdateAgentInput, _now: DateTime<Utc>) {
        if let Some(business_unit) = &input.business_unit {
            agent.business_unit = Some(business_unit.clone());
        }
    }
}
