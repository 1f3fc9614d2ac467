use std::sync::Arc;

use crate::application::ports::{
    SummaryRepository, TaskQueue, TaskRepository, TranscriptRepository,
};
use crate::application::services::{
    CancellationRegistry, ProgressBroadcaster, QuotaService, SmartSelector,
};
use crate::presentation::config::UploadSettings;

/// Handler-facing collaborators. Trait objects rather than the generics
/// the handlers once carried: the parameter list outgrew its usefulness.
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskRepository>,
    pub transcripts: Arc<dyn TranscriptRepository>,
    pub summaries: Arc<dyn SummaryRepository>,
    pub quota: Arc<QuotaService>,
    pub selector: Arc<SmartSelector>,
    pub progress: Arc<ProgressBroadcaster>,
    pub queue: Arc<dyn TaskQueue>,
    pub cancellations: Arc<CancellationRegistry>,
    pub upload: UploadSettings,
}
