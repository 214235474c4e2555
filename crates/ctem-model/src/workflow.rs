//! Automation workflows
//!
//! Only the list/detail projection lives here; the node graph edited by the
//! visual builder is opaque to the data layer.

use crate::error::{optional_text, require_text, ValidationError};
use crate::permission::Permission;
use crate::query::{
    facet_matches, text_matches, PageRequest, QueryParams, ResourceFilter, SortKey, SortSpec,
};
use crate::resource::{Envelope, Resource, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What starts a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowTrigger {
    /// Started by a user
    Manual,
    /// Cron schedule
    Schedule,
    /// Platform event (new exposure, scan finished, ...)
    Event,
}

impl WorkflowTrigger {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Schedule => "schedule",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for WorkflowTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Runs on its trigger
    Active,
    /// Trigger ignored
    Paused,
    /// Never published
    Draft,
}

impl WorkflowStatus {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Draft => "draft",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow summary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Opaque identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Trigger kind
    pub trigger: WorkflowTrigger,
    /// Lifecycle state
    pub status: WorkflowStatus,
    /// Nodes in the graph
    pub node_count: u32,
    /// Completed runs
    pub run_count: u32,
    /// Last run start
    pub last_run_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Filter object for `GET /workflows`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowFilters {
    /// Substring of name or description
    pub search: Option<String>,
    /// Any of these states
    pub status: Vec<WorkflowStatus>,
    /// Any of these trigger kinds
    pub trigger: Vec<WorkflowTrigger>,
    /// Page selection
    pub page: PageRequest,
    /// Ordering
    pub sort: Option<SortSpec>,
}

impl ResourceFilter<Workflow> for WorkflowFilters {
    fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_opt("search", self.search.as_deref());
        params.push_list("status", &self.status);
        params.push_list("trigger", &self.trigger);
        self.page.write(&mut params);
        SortSpec::write(self.sort.as_ref(), &mut params);
        params
    }

    fn matches(&self, workflow: &Workflow) -> bool {
        text_matches(
            self.search.as_deref(),
            &[
                workflow.name.as_str(),
                workflow.description.as_deref().unwrap_or_default(),
            ],
        ) && facet_matches(&self.status, &workflow.status)
            && facet_matches(&self.trigger, &workflow.trigger)
    }

    fn page(&self) -> PageRequest {
        self.page
    }

    fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }
}

/// New workflow (starts as a draft)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowInput {
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Trigger kind
    pub trigger: WorkflowTrigger,
}

/// Wire payload for `POST /workflows`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateWorkflowPayload {
    /// Display name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Trigger kind
    pub trigger: WorkflowTrigger,
}

impl Validate for CreateWorkflowInput {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, 100)?;
        optional_text("description", self.description.as_deref(), 500)
    }
}

impl Envelope for CreateWorkflowInput {
    type Wire = CreateWorkflowPayload;

    fn to_wire(&self) -> Self::Wire {
        CreateWorkflowPayload {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            trigger: self.trigger,
        }
    }
}

/// Workflow edit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowInput {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// Activate, pause
    pub status: Option<WorkflowStatus>,
}

/// Wire payload for `PUT /workflows/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateWorkflowPayload {
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
}

impl Validate for UpdateWorkflowInput {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("name", self.name.as_deref(), 100)?;
        if self.status == Some(WorkflowStatus::Draft) {
            return Err(ValidationError::new("status", "a published workflow can not return to draft"));
        }
        Ok(())
    }
}

impl Envelope for UpdateWorkflowInput {
    type Wire = UpdateWorkflowPayload;

    fn to_wire(&self) -> Self::Wire {
        UpdateWorkflowPayload {
            name: self.name.as_ref().map(|n| n.trim().to_string()),
            description: self.description.clone(),
            status: self.status,
        }
    }
}

/// Marker for the workflow resource
#[derive(Debug, Clone, Copy)]
pub struct Workflows;

impl Resource for Workflows {
    const NAMESPACE: &'static str = "workflows";
    const LABEL: &'static str = "Workflow";
    const READ: Permission = Permission::WorkflowsRead;
    const WRITE: Permission = Permission::WorkflowsWrite;

    type Record = Workflow;
    type Filters = WorkflowFilters;
    type Create = CreateWorkflowInput;
    type Update = UpdateWorkflowInput;

    fn id(record: &Workflow) -> &str {
        &record.id
    }

    fn sort_key(record: &Workflow, field: &str) -> Option<SortKey> {
        match field {
            "name" => Some(SortKey::Text(record.name.clone())),
            "run_count" => Some(SortKey::Number(f64::from(record.run_count))),
            "updated_at" => Some(SortKey::Time(record.updated_at)),
            _ => None,
        }
    }
}
