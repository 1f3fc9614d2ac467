use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryType {
    Overview,
    KeyPoints,
    ActionItems,
    Chapters,
    VisualMindmap,
    VisualTimeline,
    VisualFlowchart,
}

impl SummaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::Overview => "overview",
            SummaryType::KeyPoints => "key_points",
            SummaryType::ActionItems => "action_items",
            SummaryType::Chapters => "chapters",
            SummaryType::VisualMindmap => "visual_mindmap",
            SummaryType::VisualTimeline => "visual_timeline",
            SummaryType::VisualFlowchart => "visual_flowchart",
        }
    }

    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            SummaryType::VisualMindmap | SummaryType::VisualTimeline | SummaryType::VisualFlowchart
        )
    }

    /// The three text summaries produced for every completed task.
    pub const TEXT_TYPES: [SummaryType; 3] = [
        SummaryType::Overview,
        SummaryType::KeyPoints,
        SummaryType::ActionItems,
    ];
}

impl FromStr for SummaryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(SummaryType::Overview),
            "key_points" => Ok(SummaryType::KeyPoints),
            "action_items" => Ok(SummaryType::ActionItems),
            "chapters" => Ok(SummaryType::Chapters),
            "visual_mindmap" => Ok(SummaryType::VisualMindmap),
            "visual_timeline" => Ok(SummaryType::VisualTimeline),
            "visual_flowchart" => Ok(SummaryType::VisualFlowchart),
            _ => Err(format!("Invalid summary type: {}", s)),
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub id: Uuid,
    pub task_id: TaskId,
    pub summary_type: SummaryType,
    pub version: i32,
    pub is_active: bool,
    pub content: String,
    pub visual_format: Option<String>,
    pub visual_content: Option<String>,
    pub image_key: Option<String>,
    pub model_used: Option<String>,
    pub prompt_version: Option<String>,
    pub token_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn text(
        task_id: TaskId,
        summary_type: SummaryType,
        content: String,
        model_used: String,
        prompt_version: &str,
    ) -> Self {
        let token_count = content.chars().count() as i32;
        Self {
            id: Uuid::new_v4(),
            task_id,
            summary_type,
            version: 1,
            is_active: true,
            content,
            visual_format: None,
            visual_content: None,
            image_key: None,
            model_used: Some(model_used),
            prompt_version: Some(prompt_version.to_string()),
            token_count: Some(token_count),
            created_at: Utc::now(),
        }
    }

    pub fn visual(
        task_id: TaskId,
        summary_type: SummaryType,
        mermaid: String,
        model_used: String,
        prompt_version: &str,
    ) -> Self {
        let token_count = mermaid.chars().count() as i32;
        Self {
            id: Uuid::new_v4(),
            task_id,
            summary_type,
            version: 1,
            is_active: true,
            content: mermaid.clone(),
            visual_format: Some("mermaid".to_string()),
            visual_content: Some(mermaid),
            image_key: None,
            model_used: Some(model_used),
            prompt_version: Some(prompt_version.to_string()),
            token_count: Some(token_count),
            created_at: Utc::now(),
        }
    }
}
