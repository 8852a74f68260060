//! Process-wide object graph assembled from settings.

use std::sync::Arc;
use std::time::Duration;

use triage_llm::{CompletionClient, DeterministicClient, DeterministicStage, OpenAiClient};
use triage_matrix::HttpMatrixClient;
use triage_service::{
    AuthService, ExecuteCleanupService, HandleDoctorDecisionService, JobFailureService,
    Llm1Service, Llm2Service, PlainTextExtractor, PostRoom2WidgetService, PostRoom3RequestService,
    PostRoom4SummaryService, ProcessPdfCaseService, PromptManagementService,
    PromptTemplateService, RecoveryService, Room1FinalService, Room1IntakeService,
    Room2ReplyService, Room3SchedulerReplyService, SupervisorSummaryScheduler, TokioSleeper,
    WorkerRuntime, build_worker_handlers,
};
use triage_storage::PgStorage;

use crate::config::{LlmRuntimeMode, Settings};

/// Everything a subcommand may need, built once at startup.
pub struct AppContext {
    pub storage: Arc<PgStorage>,
    pub matrix: Arc<HttpMatrixClient>,
    pub decision_service: Arc<HandleDoctorDecisionService>,
    pub auth_service: Arc<AuthService>,
    pub prompt_management: Arc<PromptManagementService>,
    pub intake: Arc<Room1IntakeService>,
    pub room2_reply: Arc<Room2ReplyService>,
    pub room3_reply: Arc<Room3SchedulerReplyService>,
    pub recovery: Arc<RecoveryService>,
    pub scheduler: Arc<SupervisorSummaryScheduler>,
    pub worker_runtime: Arc<WorkerRuntime>,
}

pub async fn build_context(settings: &Settings) -> anyhow::Result<AppContext> {
    let storage = Arc::new(PgStorage::new(&settings.database_url).await?);
    let matrix = Arc::new(HttpMatrixClient::new(
        settings.matrix_homeserver_url.clone(),
        settings.matrix_access_token.clone(),
    ));

    let prompts = Arc::new(PromptTemplateService::new(storage.clone() as _));
    let (llm1_client, llm2_client) = build_llm_clients(settings);

    let llm1 = Arc::new(Llm1Service::new(llm1_client, prompts.clone(), storage.clone() as _));
    let llm2 = Arc::new(Llm2Service::new(llm2_client, prompts.clone(), storage.clone() as _));

    let decision_service = Arc::new(HandleDoctorDecisionService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
    ));
    let auth_service = Arc::new(AuthService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
    ));
    let prompt_management = Arc::new(PromptManagementService::new(storage.clone() as _));

    let pipeline = Arc::new(ProcessPdfCaseService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
        Arc::new(PlainTextExtractor),
        llm1,
        llm2,
    ));
    let room2_post = Arc::new(PostRoom2WidgetService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
        settings.room2_id.clone(),
    ));
    let room3_post = Arc::new(PostRoom3RequestService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
        settings.room3_id.clone(),
    ));
    let room1_final = Arc::new(Room1FinalService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
    ));
    let cleanup = Arc::new(ExecuteCleanupService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
        Arc::new(TokioSleeper),
    ));
    let room4 = Arc::new(PostRoom4SummaryService::new(
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
    ));

    let handlers =
        build_worker_handlers(pipeline, room2_post, room3_post, room1_final, cleanup, room4);
    let failure_finalizer = Arc::new(JobFailureService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
    ));
    let worker_runtime = Arc::new(
        WorkerRuntime::new(storage.clone() as _, handlers)
            .with_failure_finalizer(failure_finalizer)
            .with_poll_interval(Duration::from_secs_f64(
                settings.worker_poll_interval_seconds.max(0.1),
            )),
    );

    let intake = Arc::new(Room1IntakeService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
    ));
    let room2_reply = Arc::new(Room2ReplyService::new(
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
        decision_service.clone(),
        settings.room2_id.clone(),
    ));
    let room3_reply = Arc::new(Room3SchedulerReplyService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
        matrix.clone() as _,
        settings.room3_id.clone(),
    ));
    let recovery = Arc::new(RecoveryService::new(
        storage.clone() as _,
        storage.clone() as _,
        storage.clone() as _,
    ));
    let scheduler = Arc::new(SupervisorSummaryScheduler::new(
        storage.clone() as _,
        storage.clone() as _,
        settings.room4_id.clone(),
        settings.supervisor_summary_timezone.clone(),
        settings.supervisor_summary_morning_hour,
        settings.supervisor_summary_evening_hour,
    ));

    Ok(AppContext {
        storage,
        matrix,
        decision_service,
        auth_service,
        prompt_management,
        intake,
        room2_reply,
        room3_reply,
        recovery,
        scheduler,
        worker_runtime,
    })
}

fn build_llm_clients(
    settings: &Settings,
) -> (Arc<dyn CompletionClient>, Arc<dyn CompletionClient>) {
    match settings.llm_runtime_mode {
        LlmRuntimeMode::Deterministic => (
            Arc::new(DeterministicClient::new(DeterministicStage::Llm1)),
            Arc::new(DeterministicClient::new(DeterministicStage::Llm2)),
        ),
        LlmRuntimeMode::Provider => {
            let api_key = settings.openai_api_key.clone().unwrap_or_default();
            let timeout = Duration::from_secs_f64(settings.openai_timeout_seconds.max(1.0));
            let llm1 = OpenAiClient::new(
                api_key.clone(),
                settings.openai_base_url.clone(),
                settings.openai_model_llm1.clone(),
            )
            .with_temperature(settings.openai_temperature)
            .with_timeout(timeout);
            let llm2 = OpenAiClient::new(
                api_key,
                settings.openai_base_url.clone(),
                settings.openai_model_llm2.clone(),
            )
            .with_temperature(settings.openai_temperature)
            .with_timeout(timeout);
            (Arc::new(llm1), Arc::new(llm2))
        }
    }
}
