// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbedRequest type for POST /embedding

use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// Request body for POST /embedding
///
/// # Example
/// ```json
/// { "text": "hello world" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Text to embed; absent and `null` are treated like an empty string
    #[serde(default)]
    pub text: Option<String>,
}

impl EmbedRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// Returns the text to embed, or `ApiError::TextRequired` when it is
    /// missing or only whitespace.
    ///
    /// The text is returned as sent; trimming only decides emptiness.
    pub fn validate(&self) -> Result<&str, ApiError> {
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ApiError::TextRequired),
        }
    }
}
