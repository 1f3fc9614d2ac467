use std::sync::Arc;

use crate::application::ports::{
    LlmError, LlmParams, RepositoryError, SummaryRepository, VisualRenderer,
};
use crate::domain::{ObjectKey, Summary, SummaryType, Task, TranscriptSegment};

use super::cost::CostTracker;
use super::prompts::{self, PROMPT_VERSION};
use super::selector::{LlmSelection, SelectorError, SmartSelector};
use super::transcript_processor::{self, QualityScore, TranscriptQuality};

const CHAPTER_MIN_CHARS: usize = 2000;

const MERMAID_DIAGRAM_TYPES: &[&str] = &[
    "mindmap",
    "timeline",
    "flowchart",
    "graph",
    "sequenceDiagram",
    "gantt",
    "pie",
];

/// Stronger model swapped in when the transcript quality is low.
#[derive(Debug, Clone)]
pub struct PremiumLlm {
    pub provider: String,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub summaries: Vec<Summary>,
    pub quality: TranscriptQuality,
    pub provider: String,
    pub model: String,
    pub chapter_count: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error(transparent)]
    Selection(#[from] SelectorError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("invalid diagram output: {0}")]
    InvalidDiagram(String),
    #[error("prompt template missing: {0}")]
    Prompt(String),
    #[error("all summary types failed")]
    AllTypesFailed,
    #[error("transcript is empty")]
    EmptyTranscript,
}

impl SummaryError {
    pub fn is_transient(&self) -> bool {
        match self {
            SummaryError::Llm(e) => e.is_transient(),
            SummaryError::Selection(_) => false,
            SummaryError::Repository(_) => false,
            _ => false,
        }
    }
}

/// Quality-aware summary generation over the selected LLM.
pub struct SummaryGenerator {
    selector: Arc<SmartSelector>,
    summaries: Arc<dyn SummaryRepository>,
    cost: Arc<CostTracker>,
    renderer: Option<Arc<dyn VisualRenderer>>,
    premium: Option<PremiumLlm>,
}

impl SummaryGenerator {
    pub fn new(
        selector: Arc<SmartSelector>,
        summaries: Arc<dyn SummaryRepository>,
        cost: Arc<CostTracker>,
        renderer: Option<Arc<dyn VisualRenderer>>,
        premium: Option<PremiumLlm>,
    ) -> Self {
        Self {
            selector,
            summaries,
            cost,
            renderer,
            premium,
        }
    }

    /// Produce and persist the overview / key-points / action-items set,
    /// plus a chapters record for long transcripts. A single failing type
    /// is skipped; only a fully empty batch is an error.
    pub async fn generate_for_task(
        &self,
        task: &Task,
        segments: &[TranscriptSegment],
    ) -> Result<GenerationOutcome, SummaryError> {
        if segments.is_empty() {
            return Err(SummaryError::EmptyTranscript);
        }

        let locale = locale_for(task);
        let style = task.options.summary_style();
        let quality = transcript_processor::assess_quality(segments);
        let text = transcript_processor::preprocess(segments);
        if text.is_empty() {
            return Err(SummaryError::EmptyTranscript);
        }
        let notice = transcript_processor::quality_notice(&quality, locale);

        tracing::info!(
            task_id = %task.id,
            quality = quality.score.as_str(),
            avg_confidence = quality.avg_confidence,
            chars = text.chars().count(),
            "Generating summaries"
        );

        let selection = self.pick_llm(task, &quality).await?;
        let model = selection.client.model_name().to_string();

        let mut chapter_count = None;
        let mut summaries = Vec::new();

        if text.chars().count() > CHAPTER_MIN_CHARS {
            match self
                .generate_chapters(task, &selection, &text, locale, style, &notice)
                .await
            {
                Ok((summary, count)) => {
                    chapter_count = Some(count);
                    summaries.push(summary);
                }
                Err(e) => {
                    // Chapter segmentation is best-effort.
                    tracing::warn!(task_id = %task.id, error = %e, "Chapter segmentation failed");
                }
            }
        }

        for summary_type in SummaryType::TEXT_TYPES {
            match self
                .generate_text_summary(task, &selection, summary_type, &text, locale, style, &notice)
                .await
            {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    tracing::error!(
                        task_id = %task.id,
                        summary_type = %summary_type,
                        error = %e,
                        "Summary generation failed"
                    );
                }
            }
        }

        let generated_text_types = summaries
            .iter()
            .filter(|s| !s.summary_type.is_visual() && s.summary_type != SummaryType::Chapters)
            .count();
        if generated_text_types == 0 {
            return Err(SummaryError::AllTypesFailed);
        }

        Ok(GenerationOutcome {
            summaries,
            quality,
            provider: selection.provider,
            model,
            chapter_count,
        })
    }

    /// Generate one visual summary (mindmap / timeline / flowchart) and
    /// optionally render it to an image. Render failure degrades to the
    /// text-only Mermaid source.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_visual(
        &self,
        task: &Task,
        segments: &[TranscriptSegment],
        visual_type: SummaryType,
        content_style: &str,
        provider: Option<&str>,
        model_id: Option<&str>,
        generate_image: bool,
        image_format: &str,
        regenerate: bool,
    ) -> Result<Summary, SummaryError> {
        if !regenerate {
            if let Some(existing) = self.summaries.get_active(task.id, visual_type).await? {
                tracing::info!(
                    task_id = %task.id,
                    visual_type = %visual_type,
                    "Visual summary already exists, skipping generation"
                );
                return Ok(existing);
            }
        }

        let locale = locale_for(task);
        let quality = transcript_processor::assess_quality(segments);
        let text = transcript_processor::preprocess(segments);
        if text.is_empty() {
            return Err(SummaryError::EmptyTranscript);
        }
        let notice = transcript_processor::quality_notice(&quality, locale);

        let selection = self.selector.select_llm(provider, model_id, None, None).await?;
        let prompt_type = visual_prompt_type(visual_type);
        let prompt = prompts::get_prompt("visual", prompt_type, locale, content_style, &text, &notice)
            .map_err(|e| SummaryError::Prompt(e.to_string()))?;

        let params = LlmParams {
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            model_id: model_id.map(str::to_string),
        };
        let raw = selection
            .client
            .generate(&prompt.user, Some(&prompt.system), &params)
            .await?;
        self.record_llm_usage(task, &selection, &prompt.user, &raw, prompt_type)
            .await;

        let mermaid = validate_mermaid(&raw)?;
        let summary = Summary::visual(
            task.id,
            visual_type,
            mermaid.clone(),
            selection.client.model_name().to_string(),
            PROMPT_VERSION,
        );
        let mut summary = self.summaries.insert_active(&summary).await?;

        if generate_image {
            if let Some(image_key) = self
                .render_image(task, &summary, &mermaid, image_format)
                .await
            {
                self.summaries
                    .set_image_key(summary.id, image_key.as_str())
                    .await?;
                summary.image_key = Some(image_key.as_str().to_string());
            }
        }

        Ok(summary)
    }

    async fn pick_llm(
        &self,
        task: &Task,
        quality: &TranscriptQuality,
    ) -> Result<LlmSelection, SummaryError> {
        let preferred = task.options.llm_provider.as_deref();
        let model_id = task.options.llm_model_id.as_deref();

        if quality.score == QualityScore::Low {
            if let Some(premium) = &self.premium {
                tracing::warn!(
                    task_id = %task.id,
                    avg_confidence = quality.avg_confidence,
                    premium_provider = %premium.provider,
                    "Low quality transcript, switching to premium model"
                );
                match self
                    .selector
                    .select_llm(
                        Some(&premium.provider),
                        premium.model_id.as_deref(),
                        None,
                        None,
                    )
                    .await
                {
                    Ok(selection) => return Ok(selection),
                    Err(e) => {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %e,
                            "Premium model unavailable, falling back to standard selection"
                        );
                    }
                }
            }
        }

        Ok(self.selector.select_llm(preferred, model_id, None, None).await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn generate_text_summary(
        &self,
        task: &Task,
        selection: &LlmSelection,
        summary_type: SummaryType,
        text: &str,
        locale: &str,
        style: &str,
        notice: &str,
    ) -> Result<Summary, SummaryError> {
        let prompt = prompts::get_prompt(
            "summary",
            summary_type.as_str(),
            locale,
            style,
            text,
            notice,
        )
        .map_err(|e| SummaryError::Prompt(e.to_string()))?;
        let params = LlmParams {
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            model_id: selection.model_id.clone(),
        };
        let content = selection
            .client
            .generate(&prompt.user, Some(&prompt.system), &params)
            .await?;
        self.record_llm_usage(task, selection, &prompt.user, &content, summary_type.as_str())
            .await;

        let summary = Summary::text(
            task.id,
            summary_type,
            content,
            selection.client.model_name().to_string(),
            PROMPT_VERSION,
        );
        Ok(self.summaries.insert_active(&summary).await?)
    }

    async fn generate_chapters(
        &self,
        task: &Task,
        selection: &LlmSelection,
        text: &str,
        locale: &str,
        style: &str,
        notice: &str,
    ) -> Result<(Summary, u64), SummaryError> {
        let prompt = prompts::get_prompt("segmentation", "segment", locale, style, text, notice)
            .map_err(|e| SummaryError::Prompt(e.to_string()))?;
        let params = LlmParams {
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            model_id: selection.model_id.clone(),
        };
        let raw = selection
            .client
            .generate(&prompt.user, Some(&prompt.system), &params)
            .await?;
        self.record_llm_usage(task, selection, &prompt.user, &raw, "chapters")
            .await;

        let chapters = parse_chapters(&raw)
            .ok_or_else(|| SummaryError::InvalidDiagram("unparseable chapter JSON".to_string()))?;
        let count = chapters["total_chapters"].as_u64().unwrap_or(0);

        let summary = Summary::text(
            task.id,
            SummaryType::Chapters,
            chapters.to_string(),
            selection.client.model_name().to_string(),
            PROMPT_VERSION,
        );
        let summary = self.summaries.insert_active(&summary).await?;
        Ok((summary, count))
    }

    async fn render_image(
        &self,
        task: &Task,
        summary: &Summary,
        mermaid: &str,
        image_format: &str,
    ) -> Option<ObjectKey> {
        let renderer = self.renderer.as_ref()?;
        let image = match renderer.render(mermaid, image_format).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    error = %e,
                    "Diagram render failed, keeping text-only visual"
                );
                return None;
            }
        };

        let key = ObjectKey::visual(
            task.user_id,
            task.id,
            summary.summary_type.as_str(),
            summary.id,
            image_format,
        );
        let content_type = if image_format == "svg" {
            "image/svg+xml"
        } else {
            "image/png"
        };
        match self.selector.select_storage(None).await {
            Ok(selection) => match selection.store.put_object(&key, image, content_type).await {
                Ok(()) => Some(key),
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "Visual image upload failed");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "No storage for visual image");
                None
            }
        }
    }

    async fn record_llm_usage(
        &self,
        task: &Task,
        selection: &LlmSelection,
        prompt: &str,
        response: &str,
        label: &str,
    ) {
        // Rough 4-chars-per-token estimate; good enough for accounting.
        let input_tokens = (prompt.chars().count() / 4) as u64;
        let output_tokens = (response.chars().count() / 4) as u64;
        let cost = selection
            .client
            .estimate_cost(input_tokens, output_tokens);
        let record = crate::domain::UsageRecord::new(
            crate::domain::ServiceKind::Llm,
            &selection.provider,
            cost,
            &format!("{}:{}", task.id, label),
            1,
        )
        .with_task(task.user_id, task.id)
        .with_tokens((input_tokens + output_tokens) as i64);
        self.cost.record(&record).await;
    }
}

fn locale_for(task: &Task) -> &'static str {
    match task.options.language.as_deref() {
        Some("en") => "en",
        _ => "zh",
    }
}

fn visual_prompt_type(visual_type: SummaryType) -> &'static str {
    match visual_type {
        SummaryType::VisualMindmap => "mindmap",
        SummaryType::VisualTimeline => "timeline",
        SummaryType::VisualFlowchart => "flowchart",
        _ => "mindmap",
    }
}

/// Accept a fenced ```mermaid block or bare diagram source; reject
/// anything whose first word is not a known diagram type.
pub fn validate_mermaid(content: &str) -> Result<String, SummaryError> {
    let source = match content.find("```mermaid") {
        Some(start) => {
            let body = &content[start + "```mermaid".len()..];
            match body.find("```") {
                Some(end) => body[..end].trim(),
                None => body.trim(),
            }
        }
        None => content.trim(),
    };

    if source.is_empty() {
        return Err(SummaryError::InvalidDiagram("empty diagram".to_string()));
    }

    let valid = MERMAID_DIAGRAM_TYPES
        .iter()
        .any(|diagram_type| source.starts_with(diagram_type));
    if !valid {
        let head: String = source.chars().take(50).collect();
        return Err(SummaryError::InvalidDiagram(format!(
            "not a recognized mermaid diagram: {}",
            head
        )));
    }

    Ok(source.to_string())
}

/// Direct parse first, then brace-extraction for models that wrap the
/// JSON in prose.
fn parse_chapters(raw: &str) -> Option<serde_json::Value> {
    let validated = |value: serde_json::Value| {
        if value.get("total_chapters").is_some() && value.get("chapters").is_some() {
            Some(value)
        } else {
            None
        }
    };

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        return validated(value);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(&raw[start..=end])
        .ok()
        .and_then(validated)
}
