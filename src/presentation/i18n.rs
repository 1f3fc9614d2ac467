use super::handlers::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl Locale {
    /// First supported language in the `Accept-Language` header; zh is
    /// the fallback.
    pub fn from_accept_language(header: Option<&str>) -> Self {
        let header = match header {
            Some(header) => header,
            None => return Locale::Zh,
        };
        for part in header.split(',') {
            let tag = part.split(';').next().unwrap_or("").trim().to_lowercase();
            if tag.starts_with("en") {
                return Locale::En;
            }
            if tag.starts_with("zh") {
                return Locale::Zh;
            }
        }
        Locale::Zh
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Zh => "zh",
            Locale::En => "en",
        }
    }
}

pub fn message(code: ErrorCode, locale: Locale) -> &'static str {
    match (code, locale) {
        (ErrorCode::Success, Locale::Zh) => "成功",
        (ErrorCode::Success, Locale::En) => "Success",
        (ErrorCode::InvalidParameter, Locale::Zh) => "参数错误",
        (ErrorCode::InvalidParameter, Locale::En) => "Invalid parameter",
        (ErrorCode::UnsupportedFileFormat, Locale::Zh) => "不支持的文件格式",
        (ErrorCode::UnsupportedFileFormat, Locale::En) => "Unsupported file format",
        (ErrorCode::FileTooLarge, Locale::Zh) => "文件过大",
        (ErrorCode::FileTooLarge, Locale::En) => "File too large",
        (ErrorCode::InvalidToken, Locale::Zh) => "无效的访问令牌",
        (ErrorCode::InvalidToken, Locale::En) => "Invalid access token",
        (ErrorCode::Forbidden, Locale::Zh) => "无权访问该资源",
        (ErrorCode::Forbidden, Locale::En) => "Access to this resource is forbidden",
        (ErrorCode::NotFound, Locale::Zh) => "资源不存在",
        (ErrorCode::NotFound, Locale::En) => "Resource not found",
        (ErrorCode::TaskNotFound, Locale::Zh) => "任务不存在",
        (ErrorCode::TaskNotFound, Locale::En) => "Task not found",
        (ErrorCode::DuplicateTask, Locale::Zh) => "任务已存在",
        (ErrorCode::DuplicateTask, Locale::En) => "Task already exists",
        (ErrorCode::AsrQuotaExceeded, Locale::Zh) => "该语音识别服务额度已用尽",
        (ErrorCode::AsrQuotaExceeded, Locale::En) => "ASR quota exceeded for this provider",
        (ErrorCode::AllAsrQuotasExhausted, Locale::Zh) => "所有语音识别服务额度均已用尽",
        (ErrorCode::AllAsrQuotasExhausted, Locale::En) => "All ASR provider quotas are exhausted",
        (ErrorCode::InternalError, Locale::Zh) => "系统内部错误",
        (ErrorCode::InternalError, Locale::En) => "Internal server error",
        (ErrorCode::DatabaseError, Locale::Zh) => "数据库错误",
        (ErrorCode::DatabaseError, Locale::En) => "Database error",
        (ErrorCode::AsrServiceFailed, Locale::Zh) => "语音识别服务调用失败",
        (ErrorCode::AsrServiceFailed, Locale::En) => "ASR service call failed",
        (ErrorCode::LlmServiceFailed, Locale::Zh) => "大模型服务调用失败",
        (ErrorCode::LlmServiceFailed, Locale::En) => "LLM service call failed",
        (ErrorCode::StorageServiceFailed, Locale::Zh) => "存储服务调用失败",
        (ErrorCode::StorageServiceFailed, Locale::En) => "Storage service call failed",
    }
}
