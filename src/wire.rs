//! JSON bodies exchanged between the session and the proxy endpoint.

use serde::{Deserialize, Serialize};

/// Normalized output of one generation call. Both keys are always serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalResult {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl RemovalResult {
    /// Error body used for every non-200 proxy response.
    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            image: None,
            text: Some(text.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.text.is_none()
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateParams {
    #[serde(default)]
    pub base64_image_data: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

/// Borrowed view of a request with every field present and non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteParams<'a> {
    pub base64_image_data: &'a str,
    pub mime_type: &'a str,
    pub user_prompt: &'a str,
}

impl GenerateParams {
    pub fn new(
        base64_image_data: impl Into<String>,
        mime_type: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            base64_image_data: Some(base64_image_data.into()),
            mime_type: Some(mime_type.into()),
            user_prompt: Some(user_prompt.into()),
        }
    }

    /// Returns `None` if any field is absent or empty.
    pub fn complete(&self) -> Option<CompleteParams<'_>> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|value| !value.is_empty())
        }

        Some(CompleteParams {
            base64_image_data: present(&self.base64_image_data)?,
            mime_type: present(&self.mime_type)?,
            user_prompt: present(&self.user_prompt)?,
        })
    }
}
