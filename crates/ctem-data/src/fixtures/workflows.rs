//! Workflow fixtures

use super::days_ago;
use crate::repository::MockResource;
use chrono::{DateTime, Utc};
use ctem_model::{
    CreateWorkflowInput, UpdateWorkflowInput, Workflow, WorkflowStatus, WorkflowTrigger, Workflows,
};

/// Seed workflows
#[must_use]
pub fn workflows() -> Vec<Workflow> {
    vec![
        Workflow {
            id: "wf-001".into(),
            name: "Critical exposure escalation".into(),
            description: Some("Page on-call and open a ticket for critical findings".into()),
            trigger: WorkflowTrigger::Event,
            status: WorkflowStatus::Active,
            node_count: 6,
            run_count: 128,
            last_run_at: Some(days_ago(0)),
            created_at: days_ago(210),
            updated_at: days_ago(12),
        },
        Workflow {
            id: "wf-002".into(),
            name: "Nightly risk digest".into(),
            description: Some("Summarize new exposures per business unit".into()),
            trigger: WorkflowTrigger::Schedule,
            status: WorkflowStatus::Active,
            node_count: 4,
            run_count: 90,
            last_run_at: Some(days_ago(1)),
            created_at: days_ago(95),
            updated_at: days_ago(30),
        },
        Workflow {
            id: "wf-003".into(),
            name: "Asset onboarding checks".into(),
            description: None,
            trigger: WorkflowTrigger::Manual,
            status: WorkflowStatus::Paused,
            node_count: 3,
            run_count: 7,
            last_run_at: Some(days_ago(40)),
            created_at: days_ago(60),
            updated_at: days_ago(40),
        },
    ]
}

impl MockResource for Workflows {
    const ID_PREFIX: &'static str = "wf";

    fn fixtures() -> Vec<Workflow> {
        workflows()
    }

    fn from_create(id: String, input: &CreateWorkflowInput, now: DateTime<Utc>) -> Workflow {
        Workflow {
            id,
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            trigger: input.trigger,
            status: WorkflowStatus::Draft,
            node_count: 0,
            run_count: 0,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(workflow: &mut Workflow, input: &UpdateWorkflowInput, now: DateTime<Utc>) {
        if let Some(name) = &input.name {
            workflow.name = name.trim().to_string();
        }
        if let Some(description) = &input.description {
            workflow.description = Some(description.clone());
        }
        if let Some(status) = input.status {
            workflow.status = status;
        }
        workflow.updated_at = now;
    }
}
