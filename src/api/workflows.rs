//! Workflow definition endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::criteria::Criterion;
use crate::domain::{AllowedModel, ContextMode, StepDefinition, Workflow};
use crate::infrastructure::services::{CreateWorkflowRequest, UpdateWorkflowRequest, WorkflowSummary};

/// Step as accepted over HTTP
///
/// The model arrives as a plain string so an unknown identifier is reported
/// with the list of valid options. The criterion may be given either as a
/// descriptor (`criteria`) or through the flat `criteria_type` and
/// `criteria_value` pair.
#[derive(Debug, Clone, Deserialize)]
pub struct StepPayload {
    #[serde(alias = "order")]
    pub step_order: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
    #[serde(alias = "prompt_template")]
    pub prompt: String,
    #[serde(default)]
    pub criteria: Option<Criterion>,
    #[serde(default)]
    pub criteria_type: Option<String>,
    #[serde(default)]
    pub criteria_value: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub context_mode: Option<ContextMode>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl StepPayload {
    fn criterion(&self) -> Option<Criterion> {
        if let Some(criterion) = &self.criteria {
            return Some(criterion.clone());
        }

        let kind = self.criteria_type.as_deref()?;
        let value = self.criteria_value.clone().unwrap_or_default();

        Some(match kind {
            "contains" => Criterion::contains(value),
            "regex" => Criterion::regex_with_flags(value, "s"),
            "json_valid" => Criterion::JsonValid,
            other => Criterion::Unknown {
                kind: other.to_string(),
            },
        })
    }

    /// Convert into a domain step, resolving the model
    pub fn into_step(self) -> Result<StepDefinition, ApiError> {
        let model: AllowedModel = self.model.parse().map_err(|e| {
            ApiError::from(e).with_param(format!("steps[{}].model", self.step_order))
        })?;

        let criterion = self.criterion();
        let mut step = StepDefinition::new(self.step_order, model, self.prompt);

        if let Some(name) = self.name {
            step = step.with_name(name);
        }
        if let Some(criterion) = criterion {
            step = step.with_criterion(criterion);
        }
        if let Some(max_retries) = self.max_retries {
            step = step.with_max_retries(max_retries);
        }
        if let Some(context_mode) = self.context_mode {
            step = step.with_context_mode(context_mode);
        }
        if let Some(max_tokens) = self.max_tokens {
            step = step.with_max_tokens(max_tokens);
        }

        Ok(step)
    }
}

/// Body for create and full replacement
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowPayload {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepPayload>,
}

impl WorkflowPayload {
    fn into_parts(self) -> Result<(String, Vec<StepDefinition>), ApiError> {
        let steps = self
            .steps
            .into_iter()
            .map(StepPayload::into_step)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((self.name, steps))
    }
}

/// Step as returned over HTTP
#[derive(Debug, Clone, Serialize)]
pub struct StepResponse {
    pub step_order: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub model: AllowedModel,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criterion>,
    pub max_retries: u32,
    pub context_mode: ContextMode,
    pub max_tokens: u32,
}

impl From<&StepDefinition> for StepResponse {
    fn from(step: &StepDefinition) -> Self {
        Self {
            step_order: step.order(),
            name: step.name().map(String::from),
            model: step.model(),
            prompt: step.prompt_template().to_string(),
            criteria: step.criterion().cloned(),
            max_retries: step.max_retries(),
            context_mode: step.context_mode(),
            max_tokens: step.max_tokens(),
        }
    }
}

/// Workflow with its ordered steps
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub steps: Vec<StepResponse>,
}

impl From<&Workflow> for WorkflowResponse {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id().as_str().to_string(),
            name: workflow.name().to_string(),
            created_at: workflow.created_at().to_rfc3339(),
            updated_at: workflow.updated_at().to_rfc3339(),
            steps: workflow.steps().iter().map(StepResponse::from).collect(),
        }
    }
}

/// GET /workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowSummary>>, ApiError> {
    debug!("Listing workflows");

    let summaries = state.workflow_service.list().await?;
    Ok(Json(summaries))
}

/// POST /workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(payload): Json<WorkflowPayload>,
) -> Result<(StatusCode, Json<WorkflowResponse>), ApiError> {
    debug!(name = %payload.name, steps = payload.steps.len(), "Creating workflow");

    let (name, steps) = payload.into_parts()?;
    let workflow = state
        .workflow_service
        .create(CreateWorkflowRequest::new(name).with_steps(steps))
        .await?;

    Ok((StatusCode::CREATED, Json(WorkflowResponse::from(&workflow))))
}

/// GET /workflows/{workflow_id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    debug!(workflow_id = %workflow_id, "Getting workflow");

    let workflow = state.workflow_service.get(&workflow_id).await?;
    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// PUT /workflows/{workflow_id}
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(payload): Json<WorkflowPayload>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    debug!(workflow_id = %workflow_id, "Replacing workflow");

    let (name, steps) = payload.into_parts()?;
    let workflow = state
        .workflow_service
        .update(&workflow_id, UpdateWorkflowRequest::new(name, steps))
        .await?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// DELETE /workflows/{workflow_id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    debug!(workflow_id = %workflow_id, "Deleting workflow");

    state.workflow_service.delete(&workflow_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> StepPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_step_payload_defaults() {
        let step = payload(json!({"step_order": 1, "model": "kimi-k2p5", "prompt": "Write code"}))
            .into_step()
            .unwrap();

        assert_eq!(step.order(), 1);
        assert_eq!(step.max_retries(), 2);
        assert_eq!(step.context_mode(), ContextMode::Full);
        assert_eq!(step.max_tokens(), 300);
        assert!(step.criterion().is_none());
    }

    #[test]
    fn test_flat_criteria_fields() {
        let step = payload(json!({
            "step_order": 2,
            "model": "kimi-k2-instruct-0905",
            "prompt": "tests",
            "criteria_type": "regex",
            "criteria_value": "```python[\\s\\S]*```",
            "context_mode": "code_only"
        }))
        .into_step()
        .unwrap();

        assert_eq!(
            step.criterion(),
            Some(&Criterion::regex_with_flags("```python[\\s\\S]*```", "s"))
        );
        assert_eq!(step.context_mode(), ContextMode::CodeOnly);
        assert_eq!(step.max_tokens(), 160);

        let json_step = payload(json!({
            "step_order": 1, "model": "kimi-k2p5", "prompt": "p", "criteria_type": "json_valid"
        }))
        .into_step()
        .unwrap();
        assert_eq!(json_step.criterion(), Some(&Criterion::JsonValid));
    }

    #[test]
    fn test_descriptor_wins_over_flat_fields() {
        let step = payload(json!({
            "step_order": 1,
            "model": "kimi-k2p5",
            "prompt": "p",
            "criteria": {"kind": "contains", "keyword": "pytest"},
            "criteria_type": "json_valid"
        }))
        .into_step()
        .unwrap();

        assert_eq!(step.criterion(), Some(&Criterion::contains("pytest")));
    }

    #[test]
    fn test_unknown_model_lists_options() {
        let error = payload(json!({"step_order": 3, "model": "gpt-4", "prompt": "p"}))
            .into_step()
            .unwrap_err();

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert!(error.response.error.message.contains("kimi-k2-instruct-0905, kimi-k2p5"));
        assert_eq!(error.response.error.param.as_deref(), Some("steps[3].model"));
    }

    #[test]
    fn test_workflow_response_shape() {
        let workflow = Workflow::new(crate::domain::WorkflowId::generate(), "wf").with_step(
            StepDefinition::new(1, AllowedModel::KimiK2p5, "p").with_criterion(Criterion::JsonValid),
        );

        let value = serde_json::to_value(WorkflowResponse::from(&workflow)).unwrap();

        assert_eq!(value["name"], "wf");
        assert_eq!(value["steps"][0]["model"], "kimi-k2p5");
        assert_eq!(value["steps"][0]["criteria"]["kind"], "json_valid");
        assert_eq!(value["steps"][0]["max_tokens"], 300);
        assert!(value["steps"][0].get("name").is_none());
    }
}
