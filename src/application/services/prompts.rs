/// Layered prompt catalog keyed by (category, prompt_type, locale,
/// content_style). Templates carry `{transcript}`, `{quality_notice}` and
/// `{style_guidance}` variables; unknown styles fall back to `general`,
/// unknown locales to `zh`.

pub const PROMPT_VERSION: &str = "v1.2.0";

#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

struct Template {
    system: &'static str,
    user: &'static str,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("no prompt template for {category}/{prompt_type}")]
pub struct PromptNotFound {
    pub category: String,
    pub prompt_type: String,
}

pub fn get_prompt(
    category: &str,
    prompt_type: &str,
    locale: &str,
    content_style: &str,
    transcript: &str,
    quality_notice: &str,
) -> Result<RenderedPrompt, PromptNotFound> {
    let locale = if locale == "en" { "en" } else { "zh" };
    let template = lookup(category, prompt_type, locale).ok_or_else(|| PromptNotFound {
        category: category.to_string(),
        prompt_type: prompt_type.to_string(),
    })?;
    let guidance = style_guidance(content_style, locale);

    let render = |text: &str| {
        text.replace("{style_guidance}", guidance)
            .replace("{quality_notice}", quality_notice)
            .replace("{transcript}", transcript)
    };

    Ok(RenderedPrompt {
        system: render(template.system),
        user: render(template.user),
        temperature: template.temperature,
        max_tokens: template.max_tokens,
    })
}

fn lookup(category: &str, prompt_type: &str, locale: &str) -> Option<&'static Template> {
    match (category, prompt_type, locale) {
        ("summary", "overview", "zh") => Some(&OVERVIEW_ZH),
        ("summary", "overview", "en") => Some(&OVERVIEW_EN),
        ("summary", "key_points", "zh") => Some(&KEY_POINTS_ZH),
        ("summary", "key_points", "en") => Some(&KEY_POINTS_EN),
        ("summary", "action_items", "zh") => Some(&ACTION_ITEMS_ZH),
        ("summary", "action_items", "en") => Some(&ACTION_ITEMS_EN),
        ("segmentation", "segment", "zh") => Some(&SEGMENT_ZH),
        ("segmentation", "segment", "en") => Some(&SEGMENT_EN),
        ("visual", "mindmap", _) => Some(&VISUAL_MINDMAP),
        ("visual", "timeline", _) => Some(&VISUAL_TIMELINE),
        ("visual", "flowchart", _) => Some(&VISUAL_FLOWCHART),
        _ => None,
    }
}

fn style_guidance(content_style: &str, locale: &str) -> &'static str {
    match (content_style, locale) {
        ("meeting", "zh") => "这是一场会议录音，关注讨论议题、结论与分歧。",
        ("meeting", _) => "This is a meeting recording; focus on topics discussed, decisions and open disagreements.",
        ("learning", "zh") => "这是学习材料，关注知识点、概念与例子。",
        ("learning", _) => "This is learning material; focus on concepts, definitions and worked examples.",
        ("interview", "zh") => "这是一段访谈，关注问答要点与受访者观点。",
        ("interview", _) => "This is an interview; focus on the questions asked and the interviewee's positions.",
        ("lecture", "zh") => "这是一堂讲座，关注主线论点与论证结构。",
        ("lecture", _) => "This is a lecture; focus on the main thesis and the structure of the argument.",
        ("podcast", "zh") => "这是一期播客，关注话题脉络与嘉宾观点。",
        ("podcast", _) => "This is a podcast episode; focus on the topic flow and each speaker's take.",
        ("video", "zh") => "这是一段视频内容，关注叙述主线与关键信息。",
        ("video", _) => "This is video content; focus on the narrative thread and key information.",
        ("general", "zh") | (_, "zh") => "请根据内容特点自行把握重点。",
        _ => "Use your judgement about what matters most in this content.",
    }
}

static OVERVIEW_ZH: Template = Template {
    system: "你是专业的内容总结助手。{style_guidance}",
    user: "{quality_notice}\n\n请用 Markdown 写一段全文概要，涵盖主要内容、核心结论与整体脉络，长度控制在 300 字以内。\n\n转写文本：\n{transcript}",
    temperature: 0.7,
    max_tokens: 1500,
};

static OVERVIEW_EN: Template = Template {
    system: "You are a professional summarization assistant. {style_guidance}",
    user: "{quality_notice}\n\nWrite a Markdown overview of the transcript below: the main content, core conclusions and overall structure, in at most 250 words.\n\nTranscript:\n{transcript}",
    temperature: 0.7,
    max_tokens: 1500,
};

static KEY_POINTS_ZH: Template = Template {
    system: "你是专业的内容总结助手。{style_guidance}",
    user: "{quality_notice}\n\n请以 Markdown 列表提炼转写文本的关键要点，每条一句话，按重要性排序，最多 10 条。\n\n转写文本：\n{transcript}",
    temperature: 0.5,
    max_tokens: 1500,
};

static KEY_POINTS_EN: Template = Template {
    system: "You are a professional summarization assistant. {style_guidance}",
    user: "{quality_notice}\n\nExtract the key points of the transcript below as a Markdown list, one sentence each, ordered by importance, at most 10 items.\n\nTranscript:\n{transcript}",
    temperature: 0.5,
    max_tokens: 1500,
};

static ACTION_ITEMS_ZH: Template = Template {
    system: "你是专业的内容总结助手。{style_guidance}",
    user: "{quality_notice}\n\n请从转写文本中提取行动项，以 Markdown 任务列表输出（- [ ] 负责人：事项）。没有行动项时输出\"无明确行动项\"。\n\n转写文本：\n{transcript}",
    temperature: 0.3,
    max_tokens: 1000,
};

static ACTION_ITEMS_EN: Template = Template {
    system: "You are a professional summarization assistant. {style_guidance}",
    user: "{quality_notice}\n\nExtract action items from the transcript below as a Markdown task list (- [ ] owner: item). If there are none, answer \"No explicit action items\".\n\nTranscript:\n{transcript}",
    temperature: 0.3,
    max_tokens: 1000,
};

static SEGMENT_ZH: Template = Template {
    system: "你是内容结构分析助手。只输出 JSON，不要输出其他内容。{style_guidance}",
    user: "{quality_notice}\n\n请将转写文本划分为章节，输出 JSON：{\"total_chapters\": n, \"chapters\": [{\"index\": 1, \"title\": \"…\", \"start_offset\": 0, \"end_offset\": 100, \"summary\": \"…\"}]}，offset 为字符偏移。\n\n转写文本：\n{transcript}",
    temperature: 0.3,
    max_tokens: 1500,
};

static SEGMENT_EN: Template = Template {
    system: "You are a content structure analyst. Output JSON only. {style_guidance}",
    user: "{quality_notice}\n\nSplit the transcript into chapters and output JSON: {\"total_chapters\": n, \"chapters\": [{\"index\": 1, \"title\": \"…\", \"start_offset\": 0, \"end_offset\": 100, \"summary\": \"…\"}]} where offsets are character offsets.\n\nTranscript:\n{transcript}",
    temperature: 0.3,
    max_tokens: 1500,
};

static VISUAL_MINDMAP: Template = Template {
    system: "You turn transcripts into Mermaid diagrams. Output a single ```mermaid code block and nothing else. {style_guidance}",
    user: "{quality_notice}\n\nCreate a Mermaid `mindmap` of the main topics and subtopics of the transcript below.\n\nTranscript:\n{transcript}",
    temperature: 0.4,
    max_tokens: 2000,
};

static VISUAL_TIMELINE: Template = Template {
    system: "You turn transcripts into Mermaid diagrams. Output a single ```mermaid code block and nothing else. {style_guidance}",
    user: "{quality_notice}\n\nCreate a Mermaid `timeline` of the chronological flow of the transcript below.\n\nTranscript:\n{transcript}",
    temperature: 0.4,
    max_tokens: 2000,
};

static VISUAL_FLOWCHART: Template = Template {
    system: "You turn transcripts into Mermaid diagrams. Output a single ```mermaid code block and nothing else. {style_guidance}",
    user: "{quality_notice}\n\nCreate a Mermaid `flowchart TD` of the decisions and process described in the transcript below.\n\nTranscript:\n{transcript}",
    temperature: 0.4,
    max_tokens: 2000,
};
