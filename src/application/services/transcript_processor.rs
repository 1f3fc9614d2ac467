use crate::domain::TranscriptSegment;

const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;
const HIGH_QUALITY_THRESHOLD: f64 = 0.8;
const MEDIUM_QUALITY_THRESHOLD: f64 = 0.6;
const MERGE_GAP_SECONDS: f64 = 2.0;

/// Short filler utterances dropped during preprocessing when they also
/// carry low confidence.
const FILLER_WORDS: &[&str] = &[
    "嗯", "啊", "呃", "额", "哦", "嗷", "唉", "诶", "哎", "um", "uh", "er", "ah", "hm", "mm",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityScore {
    High,
    Medium,
    Low,
}

impl QualityScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityScore::High => "high",
            QualityScore::Medium => "medium",
            QualityScore::Low => "low",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptQuality {
    pub score: QualityScore,
    pub avg_confidence: f64,
    pub low_confidence_count: usize,
    pub low_confidence_ratio: f64,
}

/// Average-confidence quality classification. Segments without a
/// confidence value are excluded from the average; a transcript with no
/// confidence at all is assumed medium.
pub fn assess_quality(segments: &[TranscriptSegment]) -> TranscriptQuality {
    if segments.is_empty() {
        return TranscriptQuality {
            score: QualityScore::Low,
            avg_confidence: 0.0,
            low_confidence_count: 0,
            low_confidence_ratio: 1.0,
        };
    }

    let with_confidence: Vec<f64> = segments.iter().filter_map(|s| s.confidence).collect();
    if with_confidence.is_empty() {
        return TranscriptQuality {
            score: QualityScore::Medium,
            avg_confidence: 0.75,
            low_confidence_count: 0,
            low_confidence_ratio: 0.0,
        };
    }

    let avg_confidence = with_confidence.iter().sum::<f64>() / with_confidence.len() as f64;
    let low_confidence_count = with_confidence
        .iter()
        .filter(|c| **c < LOW_CONFIDENCE_THRESHOLD)
        .count();
    let low_confidence_ratio = low_confidence_count as f64 / segments.len() as f64;

    let score = if avg_confidence >= HIGH_QUALITY_THRESHOLD {
        QualityScore::High
    } else if avg_confidence >= MEDIUM_QUALITY_THRESHOLD {
        QualityScore::Medium
    } else {
        QualityScore::Low
    };

    TranscriptQuality {
        score,
        avg_confidence,
        low_confidence_count,
        low_confidence_ratio,
    }
}

/// Filter low-confidence fillers, merge same-speaker runs with gaps of at
/// most two seconds, and format as speaker-annotated blocks separated by
/// blank lines.
pub fn preprocess(segments: &[TranscriptSegment]) -> String {
    let filtered: Vec<&TranscriptSegment> =
        segments.iter().filter(|s| !is_filler(s)).collect();
    if filtered.is_empty() {
        return String::new();
    }

    struct Block {
        speaker_id: Option<String>,
        end_time: f64,
        content: Vec<String>,
    }

    let mut blocks: Vec<Block> = Vec::new();
    for segment in filtered {
        let start_new = match blocks.last() {
            None => true,
            Some(block) => {
                block.speaker_id != segment.speaker_id
                    || segment.start_time - block.end_time > MERGE_GAP_SECONDS
            }
        };
        if start_new {
            blocks.push(Block {
                speaker_id: segment.speaker_id.clone(),
                end_time: segment.end_time,
                content: vec![segment.content.clone()],
            });
        } else if let Some(block) = blocks.last_mut() {
            block.content.push(segment.content.clone());
            block.end_time = segment.end_time;
        }
    }

    blocks
        .iter()
        .map(|block| {
            let speaker = block.speaker_id.as_deref().unwrap_or("Speaker");
            format!("[{}] {}", speaker, block.content.join(" "))
        })
        .collect::<Vec<String>>()
        .join("\n\n")
}

fn is_filler(segment: &TranscriptSegment) -> bool {
    let content = segment.content.trim();
    let low_confidence = segment
        .confidence
        .map(|c| c < LOW_CONFIDENCE_THRESHOLD)
        .unwrap_or(false);
    low_confidence && content.chars().count() <= 2 && FILLER_WORDS.contains(&content)
}

/// Preamble injected into prompts to tell the model how much to trust
/// the transcript.
pub fn quality_notice(quality: &TranscriptQuality, locale: &str) -> String {
    match (quality.score, locale) {
        (QualityScore::Low, "en") => format!(
            "[Important] This transcript is low quality (average confidence {:.2}) and likely \
             contains recognition errors. Infer the intended meaning from context, correct \
             obvious homophone mistakes, and focus on the information you are confident about.",
            quality.avg_confidence
        ),
        (QualityScore::Low, _) => format!(
            "【重要提示】此转写文本质量较低（平均置信度：{:.2}），可能存在较多识别错误。\
             请根据上下文推断正确含义，纠正明显的同音词错误，聚焦有把握的核心信息。",
            quality.avg_confidence
        ),
        (QualityScore::Medium, "en") => "[Note] This transcript comes from speech recognition \
             and may contain occasional errors (homophones, irregular punctuation). Read it for \
             meaning and focus on the core content."
            .to_string(),
        (QualityScore::Medium, _) => "【说明】以下转写文本来自语音识别，可能存在部分识别错误\
             （如同音词混淆、标点不规范等）。请根据上下文理解文本真实含义，聚焦核心信息提取。"
            .to_string(),
        (QualityScore::High, "en") => "[Note] This transcript comes from speech recognition and \
             may contain minor errors; read it for meaning."
            .to_string(),
        (QualityScore::High, _) => "【说明】以下转写文本来自语音识别，可能存在少量识别错误。\
             请根据上下文理解文本真实含义。"
            .to_string(),
    }
}
