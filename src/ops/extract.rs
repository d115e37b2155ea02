//! Content extraction executors: typed extraction, structured harvesting,
//! and CAPTCHA detection.

use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::browser::PageDriver;
use crate::config::validate;
use crate::content;
use crate::error::{Result, ServiceError};
use crate::registry::StatsEvent;

use super::types::{
    CaptchaDetectionResult, ExtractRequest, ExtractResult, ExtractType, StructuredExtractResult,
};
use super::Operations;

/// Visible-text extraction shorter than this falls back to full text
/// content (hidden nodes included).
const VISIBLE_TEXT_FLOOR: usize = 100;

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Visible-first text read with a full-content fallback for sparse pages.
async fn smart_text(page: &dyn PageDriver, selector: &str) -> anyhow::Result<String> {
    let visible = page.inner_text(selector).await?;
    if visible.trim().len() >= VISIBLE_TEXT_FLOOR {
        return Ok(visible);
    }
    let full = page.text_content(selector).await?;
    Ok(if full.trim().len() > visible.trim().len() {
        full
    } else {
        visible
    })
}

impl Operations {
    pub async fn extract(
        &self,
        session_id: &str,
        request: ExtractRequest,
    ) -> Result<ExtractResult> {
        if let Some(selector) = &request.selector {
            validate::validate_selector(selector)?;
        }

        let session = self.registry.get(session_id).await?;
        let timeout = self.resolve_timeout(request.timeout_ms, &session)?;

        let guard = session.lock_page().await;
        let page = Self::require_page(session_id, &guard)?;

        self.pace().await;
        let start = Instant::now();

        let selector = request.selector.as_deref();
        let raw = match request.extract_type {
            ExtractType::Text => self.extract_text(page, selector, timeout).await,
            ExtractType::Html => self.extract_html(page, selector, timeout).await,
            ExtractType::Table => self.extract_table(page, selector).await,
            ExtractType::Links => self.extract_links(page, selector).await,
            ExtractType::Images => self.extract_images(page, selector).await,
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                drop(guard);
                self.record_outcome(
                    &session,
                    StatsEvent::Error(format!("extract: {e}")),
                    Some(start.elapsed()),
                    false,
                )
                .await;
                return Err(e);
            }
        };
        drop(guard);

        let data = self.enhance(&raw, request.extract_type);
        let content = primary_payload(&raw, request.extract_type);

        self.record_outcome(&session, StatsEvent::Extract, Some(start.elapsed()), true)
            .await;

        Ok(ExtractResult {
            success: true,
            extract_type: request.extract_type,
            selector: request.selector,
            content,
            data,
        })
    }

    async fn extract_text(
        &self,
        page: &dyn PageDriver,
        selector: Option<&str>,
        timeout: Duration,
    ) -> Result<Value> {
        let target = selector.unwrap_or("body");
        let wait = page.wait_for_visible(target, timeout).await;
        match (wait, selector) {
            (Err(e), Some(_)) => return Err(ServiceError::browser("extract", e)),
            (Err(e), None) => debug!("body visibility wait gave up: {e}"),
            _ => {}
        }

        let text = smart_text(page, target)
            .await
            .map_err(|e| ServiceError::browser("extract", e))?;
        let text = content::normalize(&text);

        let metrics = content::assess_quality(&text);

        // CAPTCHA is a page-level condition: judge the whole body even when
        // the caller extracted a narrow selector.
        let page_text = if target == "body" {
            text.clone()
        } else {
            page.inner_text("body")
                .await
                .map(|body| content::normalize(&body))
                .unwrap_or_else(|_| text.clone())
        };
        let (is_captcha, captcha_reason) = content::detect_captcha(page, &page_text).await;

        Ok(json!({
            "text": text,
            "length": metrics.char_count,
            "word_count": metrics.word_count,
            "line_count": metrics.line_count,
            "quality_score": metrics.quality_score,
            "has_meaningful_content": metrics.has_meaningful_content,
            "is_captcha": is_captcha,
            "captcha_reason": if is_captcha { Some(captcha_reason) } else { None },
            "type": "text",
        }))
    }

    async fn extract_html(
        &self,
        page: &dyn PageDriver,
        selector: Option<&str>,
        timeout: Duration,
    ) -> Result<Value> {
        if let Some(sel) = selector {
            page.wait_for_visible(sel, timeout)
                .await
                .map_err(|e| ServiceError::browser("extract", e))?;
        }
        let html = page
            .html(selector)
            .await
            .map_err(|e| ServiceError::browser("extract", e))?;
        Ok(json!({
            "html": html,
            "length": html.len(),
            "type": "html",
        }))
    }

    async fn extract_table(
        &self,
        page: &dyn PageDriver,
        selector: Option<&str>,
    ) -> Result<Value> {
        let candidates: Vec<&str> = match selector {
            Some(sel) => vec![sel],
            None => vec!["table", ".table", ".data-table"],
        };

        for table_selector in candidates {
            let expr = format!(
                r"(() => {{
                    const table = document.querySelector({sel});
                    if (!table) return null;
                    return Array.from(table.querySelectorAll('tr')).map(row =>
                        Array.from(row.querySelectorAll('td, th')).map(cell =>
                            (cell.innerText || '').trim()));
                }})()",
                sel = js_str(table_selector)
            );
            let value = match page.evaluate(&expr).await {
                Ok(value) => value,
                Err(_) => continue,
            };
            let Some(rows) = value.as_array() else {
                continue;
            };
            if rows.is_empty() {
                continue;
            }

            let columns = rows
                .first()
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            return Ok(json!({
                "table": rows,
                "rows": rows.len(),
                "columns": columns,
                "type": "table",
            }));
        }

        Err(ServiceError::browser("extract_table", "No tables found"))
    }

    async fn extract_links(
        &self,
        page: &dyn PageDriver,
        selector: Option<&str>,
    ) -> Result<Value> {
        let scope = match selector {
            Some(sel) => format!("{sel} a"),
            None => "a".to_string(),
        };
        let expr = format!(
            r"Array.from(document.querySelectorAll({sel}))
                .filter(a => a.getAttribute('href'))
                .map(a => ({{
                    url: a.getAttribute('href'),
                    text: (a.innerText || '').trim(),
                    base_url: window.location.href,
                }}))",
            sel = js_str(&scope)
        );
        let links = page
            .evaluate(&expr)
            .await
            .map_err(|e| ServiceError::browser("extract", e))?;
        let links = if links.is_array() { links } else { json!([]) };
        let count = links.as_array().map(Vec::len).unwrap_or(0);

        Ok(json!({
            "links": links,
            "count": count,
            "type": "links",
        }))
    }

    async fn extract_images(
        &self,
        page: &dyn PageDriver,
        selector: Option<&str>,
    ) -> Result<Value> {
        let scope = match selector {
            Some(sel) => format!("{sel} img"),
            None => "img".to_string(),
        };
        let expr = format!(
            r"Array.from(document.querySelectorAll({sel}))
                .filter(img => img.getAttribute('src'))
                .map(img => ({{
                    src: img.getAttribute('src'),
                    alt: img.getAttribute('alt') || '',
                    width: img.getAttribute('width') || '',
                    height: img.getAttribute('height') || '',
                }}))",
            sel = js_str(&scope)
        );
        let images = page
            .evaluate(&expr)
            .await
            .map_err(|e| ServiceError::browser("extract", e))?;
        let images = if images.is_array() { images } else { json!([]) };
        let count = images.as_array().map(Vec::len).unwrap_or(0);

        Ok(json!({
            "images": images,
            "count": count,
            "type": "images",
        }))
    }

    /// Post-processing pipeline: dedup check, type detection, semantic
    /// chunking (text only, confidence-gated), and quality metrics.
    fn enhance(&self, raw: &Value, extract_type: ExtractType) -> Value {
        let text = raw
            .get("text")
            .or_else(|| raw.get("html"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut enhanced = Map::new();
        enhanced.insert("raw_content".into(), raw.clone());
        enhanced.insert(
            "extract_type".into(),
            Value::from(extract_type.as_str()),
        );

        if self.config.enable_content_deduplication && !text.is_empty() {
            let is_duplicate = self.dedup.is_duplicate(text);
            enhanced.insert("is_duplicate".into(), Value::from(is_duplicate));
            if is_duplicate {
                debug!(content_length = text.len(), "duplicate content detected");
                return Value::Object(enhanced);
            }
        }

        if self.config.enable_semantic_chunking && !text.is_empty() {
            let kind = content::detect_content_type(text);
            let confidence = content::type_confidence(text, kind);
            enhanced.insert("content_type".into(), Value::from(kind.as_str()));
            enhanced.insert("type_confidence".into(), Value::from(confidence));

            if extract_type == ExtractType::Text
                && confidence > self.config.semantic_chunking_confidence_threshold
            {
                let chunks = content::chunk_content(
                    text,
                    kind,
                    self.config.semantic_chunking_confidence_threshold,
                );
                enhanced.insert(
                    "chunk_summary".into(),
                    serde_json::to_value(content::summarize_chunks(&chunks))
                        .unwrap_or(Value::Null),
                );
                enhanced.insert(
                    "chunks".into(),
                    serde_json::to_value(chunks).unwrap_or(Value::Null),
                );
            }
        }

        if !text.is_empty() {
            let metrics = content::assess_quality(text);
            enhanced.insert(
                "quality_metrics".into(),
                json!({
                    "word_count": metrics.word_count,
                    "character_count": metrics.char_count,
                    "quality_score": metrics.quality_score,
                    "has_meaningful_content": metrics.has_meaningful_content,
                }),
            );
        }

        Value::Object(enhanced)
    }

    /// Extract structured fields (headlines, symbols, usernames, ...) for a
    /// content kind.
    pub async fn extract_structured(
        &self,
        session_id: &str,
        content_type: Option<String>,
        selector: Option<String>,
        timeout_ms: Option<u64>,
    ) -> Result<StructuredExtractResult> {
        if let Some(selector) = &selector {
            validate::validate_selector(selector)?;
        }
        let kind = content_type.unwrap_or_else(|| "general".to_string());

        let session = self.registry.get(session_id).await?;
        self.resolve_timeout(timeout_ms, &session)?;

        let guard = session.lock_page().await;
        let page = Self::require_page(session_id, &guard)?;

        self.pace().await;
        let start = Instant::now();

        let target = selector.as_deref().unwrap_or("body");
        let text = smart_text(page, target).await.map_err(|e| {
            ServiceError::browser("extract_structured", e)
        });
        let text = match text {
            Ok(text) => content::normalize(&text),
            Err(e) => {
                drop(guard);
                self.record_outcome(
                    &session,
                    StatsEvent::Error(format!("extract_structured: {e}")),
                    Some(start.elapsed()),
                    false,
                )
                .await;
                return Err(e);
            }
        };

        let mut data = serde_json::to_value(content::extract_structured(&text, &kind))
            .unwrap_or_else(|_| json!({}));
        let page_url = page.current_url().await.unwrap_or_default();
        let page_title = page.title().await.unwrap_or_default();
        drop(guard);

        if let Some(obj) = data.as_object_mut() {
            obj.insert(
                "page_metadata".into(),
                json!({
                    "url": page_url,
                    "title": page_title,
                    "extraction_timestamp": chrono::Utc::now().timestamp(),
                }),
            );
        }

        self.record_outcome(&session, StatsEvent::Extract, Some(start.elapsed()), true)
            .await;

        Ok(StructuredExtractResult {
            success: true,
            content_type: kind,
            selector,
            data,
        })
    }

    /// Probe the current page for CAPTCHA or blocking interstitials.
    pub async fn detect_captcha(
        &self,
        session_id: &str,
        selector: Option<String>,
        timeout_ms: Option<u64>,
    ) -> Result<CaptchaDetectionResult> {
        if let Some(selector) = &selector {
            validate::validate_selector(selector)?;
        }

        let session = self.registry.get(session_id).await?;
        let _timeout = self.resolve_timeout(timeout_ms, &session)?;

        let guard = session.lock_page().await;
        let page = Self::require_page(session_id, &guard)?;

        let target = selector.as_deref().unwrap_or("body");
        let text = match smart_text(page, target).await {
            Ok(text) => text,
            Err(e) => {
                drop(guard);
                let err = ServiceError::browser("detect_captcha", e);
                session.record_error(&err.to_string());
                self.set_outcome(false);
                return Err(err);
            }
        };

        let (is_captcha, reason) = content::detect_captcha(page, &text).await;
        let url = page.current_url().await.unwrap_or_default();
        drop(guard);

        if is_captcha {
            warn!(session_id, reason, "CAPTCHA detected");
        }
        self.record_outcome(&session, StatsEvent::Request, None, true)
            .await;

        Ok(CaptchaDetectionResult {
            is_captcha,
            reason,
            content_length: text.chars().count(),
            url,
        })
    }
}

/// Pull the primary payload out of a raw extraction block so callers can
/// read `result.content` without digging through the data envelope.
fn primary_payload(raw: &Value, extract_type: ExtractType) -> Value {
    let key = match extract_type {
        ExtractType::Text => "text",
        ExtractType::Html => "html",
        ExtractType::Table => "table",
        ExtractType::Links => "links",
        ExtractType::Images => "images",
    };
    raw.get(key).cloned().unwrap_or(Value::Null)
}
