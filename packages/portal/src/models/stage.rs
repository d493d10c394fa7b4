use chrono::{DateTime, Utc};
use common::StageStatus;
use serde::{Deserialize, Serialize};

use crate::entity::stage;
use crate::error::AppError;

use super::shared::validate_name;

/// Request body for creating a stage. New stages start as `upcoming`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateStageRequest {
    /// 1-128 characters.
    #[schema(example = "Idea round")]
    pub name: String,
    /// Markdown.
    #[serde(default)]
    pub description: String,
    /// Display order; defaults to 0.
    #[schema(example = 1)]
    pub position: Option<i32>,
    pub start_time: DateTime<Utc>,
    /// Must be after `start_time`.
    pub end_time: DateTime<Utc>,
}

pub fn validate_create_stage(payload: &CreateStageRequest) -> Result<(), AppError> {
    validate_name("name", &payload.name, 128)?;
    validate_position(payload.position)?;
    validate_window(payload.start_time, payload.end_time)
}

/// Request body for editing a stage. Absent fields are left unchanged.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateStageRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

pub fn validate_update_stage(payload: &UpdateStageRequest) -> Result<(), AppError> {
    if let Some(name) = &payload.name {
        validate_name("name", name, 128)?;
    }
    validate_position(payload.position)
}

fn validate_position(position: Option<i32>) -> Result<(), AppError> {
    if let Some(pos) = position
        && pos < 0
    {
        return Err(AppError::field("position", "position must be >= 0"));
    }
    Ok(())
}

pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::field("end_time", "end_time must be after start_time"));
    }
    Ok(())
}

/// Request body for moving a stage along `upcoming -> active -> closed`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct StageStatusRequest {
    pub status: StageStatus,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StageResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Idea round")]
    pub name: String,
    pub description: String,
    #[schema(example = 1)]
    pub position: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: StageStatus,
}

impl From<stage::Model> for StageResponse {
    fn from(s: stage::Model) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            position: s.position,
            start_time: s.start_time,
            end_time: s.end_time,
            status: s.status,
        }
    }
}
