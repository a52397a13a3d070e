//! Request parameters for the generation endpoints.
//!
//! Optional fields are skipped when unset, both on the wire and in cache keys,
//! so `{prompt}` and `{prompt, seed: None}` address the same entry.
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl GenerateParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        GenerateParams {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::InvalidParams("prompt must not be empty".to_string()));
        }
        validate_dimensions(self.width, self.height)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchParams {
    pub prompts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl BatchParams {
    pub fn new<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BatchParams {
            prompts: prompts.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.prompts.is_empty() {
            return Err(AppError::InvalidParams("batch needs at least one prompt".to_string()));
        }
        if let Some(i) = self.prompts.iter().position(|p| p.trim().is_empty()) {
            return Err(AppError::InvalidParams(format!("prompt #{} is empty", i)));
        }
        validate_dimensions(self.width, self.height)
    }
}

fn validate_dimensions(width: Option<u32>, height: Option<u32>) -> AppResult<()> {
    for (name, value) in [("width", width), ("height", height)] {
        if value == Some(0) {
            return Err(AppError::InvalidParams(format!("{} must be positive", name)));
        }
    }
    Ok(())
}
