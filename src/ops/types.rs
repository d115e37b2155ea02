//! Operation request and result payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browser::WaitUntil;

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub url: String,
    #[serde(default)]
    pub wait_until: WaitUntil,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateResult {
    pub url: String,
    pub title: String,
    pub duration_ms: u64,
    pub success: bool,
    pub site_memory_loaded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractType {
    Text,
    Html,
    Table,
    Links,
    Images,
}

impl ExtractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
            Self::Table => "table",
            Self::Links => "links",
            Self::Images => "images",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub extract_type: ExtractType,
    pub selector: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Flattened extraction result: `content` carries the primary payload
/// directly; `data` is the full enhanced block (raw content, dedup flag,
/// detected type, chunks, quality metrics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResult {
    pub success: bool,
    pub extract_type: ExtractType,
    pub selector: Option<String>,
    pub content: Value,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    Click,
    DoubleClick,
    RightClick,
    Type,
    Select,
    Scroll,
    Hover,
}

impl InteractionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "double_click",
            Self::RightClick => "right_click",
            Self::Type => "type",
            Self::Select => "select",
            Self::Scroll => "scroll",
            Self::Hover => "hover",
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Click | Self::DoubleClick | Self::RightClick)
    }

    /// Actions that cannot proceed without a value.
    pub fn requires_value(&self) -> bool {
        matches!(self, Self::Type | Self::Select)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractOptions {
    #[serde(default = "default_true")]
    pub hover_first: bool,
}

impl Default for InteractOptions {
    fn default() -> Self {
        Self { hover_first: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractRequest {
    pub action: InteractionAction,
    pub selector: String,
    pub value: Option<String>,
    #[serde(default)]
    pub options: InteractOptions,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractResult {
    pub action: InteractionAction,
    pub selector: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    pub selector: Option<String>,
    #[serde(default)]
    pub full_page: bool,
    pub path: Option<String>,
    pub quality: Option<u8>,
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub wait_for_dynamic: bool,
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            selector: None,
            full_page: false,
            path: None,
            quality: None,
            timeout_ms: None,
            wait_for_dynamic: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotResult {
    pub path: String,
    pub selector: Option<String>,
    pub full_page: bool,
    pub size_bytes: u64,
    pub success: bool,
    pub dynamic_content_waited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaDetectionResult {
    pub is_captcha: bool,
    pub reason: String,
    pub content_length: usize,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredExtractResult {
    pub success: bool,
    pub content_type: String,
    pub selector: Option<String>,
    pub data: Value,
}

/// One descriptor inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchOperation {
    Navigate(NavigateRequest),
    Extract(ExtractRequest),
    ExtractStructured {
        #[serde(default)]
        content_type: Option<String>,
        selector: Option<String>,
        timeout_ms: Option<u64>,
    },
    DetectCaptcha {
        selector: Option<String>,
        timeout_ms: Option<u64>,
    },
    Interact(InteractRequest),
    Screenshot(ScreenshotRequest),
}

impl BatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::Extract(_) => "extract",
            Self::ExtractStructured { .. } => "extract_structured",
            Self::DetectCaptcha { .. } => "detect_captcha",
            Self::Interact(_) => "interact",
            Self::Screenshot(_) => "screenshot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub operations: Vec<BatchOperation>,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub operation: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,
    pub results: Vec<BatchItemResult>,
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub parallel: bool,
    pub max_concurrent: usize,
}
