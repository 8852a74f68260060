//! Job-type dispatch table wiring services into the worker runtime.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use triage_storage::{JobRecord, job_type};

use crate::cleanup::ExecuteCleanupService;
use crate::error::ServiceError;
use crate::pipeline::ProcessPdfCaseService;
use crate::room1::{FinalReplyKind, Room1FinalService};
use crate::room2::PostRoom2WidgetService;
use crate::room3::PostRoom3RequestService;
use crate::room4::PostRoom4SummaryService;
use crate::worker::{HandlerMap, JobHandler};

fn require_case_id(job: &JobRecord) -> Result<Uuid, ServiceError> {
    job.case_id.ok_or_else(|| {
        ServiceError::InvalidPayload(format!("{} job without case_id", job.job_type))
    })
}

struct ProcessPdfCaseHandler(Arc<ProcessPdfCaseService>);

#[async_trait]
impl JobHandler for ProcessPdfCaseHandler {
    async fn handle(&self, job: &JobRecord) -> Result<(), ServiceError> {
        let case_id = require_case_id(job)?;
        let pdf_mxc_url = job
            .payload
            .get("pdf_mxc_url")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::InvalidPayload("missing pdf_mxc_url".to_owned()))?;
        self.0.run(case_id, pdf_mxc_url).await
    }
}

struct PostRoom2WidgetHandler(Arc<PostRoom2WidgetService>);

#[async_trait]
impl JobHandler for PostRoom2WidgetHandler {
    async fn handle(&self, job: &JobRecord) -> Result<(), ServiceError> {
        self.0.run(require_case_id(job)?).await
    }
}

struct PostRoom3RequestHandler(Arc<PostRoom3RequestService>);

#[async_trait]
impl JobHandler for PostRoom3RequestHandler {
    async fn handle(&self, job: &JobRecord) -> Result<(), ServiceError> {
        self.0.run(require_case_id(job)?).await
    }
}

struct Room1FinalHandler {
    service: Arc<Room1FinalService>,
    kind: FinalReplyKind,
}

#[async_trait]
impl JobHandler for Room1FinalHandler {
    async fn handle(&self, job: &JobRecord) -> Result<(), ServiceError> {
        self.service.run(require_case_id(job)?, self.kind, &job.payload).await
    }
}

struct ExecuteCleanupHandler(Arc<ExecuteCleanupService>);

#[async_trait]
impl JobHandler for ExecuteCleanupHandler {
    async fn handle(&self, job: &JobRecord) -> Result<(), ServiceError> {
        self.0.run(require_case_id(job)?).await.map(|_| ())
    }
}

struct PostRoom4SummaryHandler(Arc<PostRoom4SummaryService>);

#[async_trait]
impl JobHandler for PostRoom4SummaryHandler {
    async fn handle(&self, job: &JobRecord) -> Result<(), ServiceError> {
        self.0.run(&job.payload).await
    }
}

/// Assemble the full runtime dispatch table.
pub fn build_worker_handlers(
    process_pdf_case: Arc<ProcessPdfCaseService>,
    post_room2_widget: Arc<PostRoom2WidgetService>,
    post_room3_request: Arc<PostRoom3RequestService>,
    room1_final: Arc<Room1FinalService>,
    execute_cleanup: Arc<ExecuteCleanupService>,
    post_room4_summary: Arc<PostRoom4SummaryService>,
) -> HandlerMap {
    let mut handlers: HandlerMap = HandlerMap::new();
    handlers.insert(
        job_type::PROCESS_PDF_CASE.to_owned(),
        Arc::new(ProcessPdfCaseHandler(process_pdf_case)),
    );
    handlers.insert(
        job_type::POST_ROOM2_WIDGET.to_owned(),
        Arc::new(PostRoom2WidgetHandler(post_room2_widget)),
    );
    handlers.insert(
        job_type::POST_ROOM3_REQUEST.to_owned(),
        Arc::new(PostRoom3RequestHandler(post_room3_request)),
    );
    handlers.insert(
        job_type::POST_ROOM1_FINAL_APPT.to_owned(),
        Arc::new(Room1FinalHandler {
            service: Arc::clone(&room1_final),
            kind: FinalReplyKind::ApptConfirmed,
        }),
    );
    handlers.insert(
        job_type::POST_ROOM1_FINAL_APPT_DENIED.to_owned(),
        Arc::new(Room1FinalHandler {
            service: Arc::clone(&room1_final),
            kind: FinalReplyKind::ApptDenied,
        }),
    );
    handlers.insert(
        job_type::POST_ROOM1_FINAL_DENIAL_TRIAGE.to_owned(),
        Arc::new(Room1FinalHandler {
            service: Arc::clone(&room1_final),
            kind: FinalReplyKind::DenialTriage,
        }),
    );
    handlers.insert(
        job_type::POST_ROOM1_FINAL_FAILURE.to_owned(),
        Arc::new(Room1FinalHandler { service: room1_final, kind: FinalReplyKind::Failure }),
    );
    handlers.insert(
        job_type::EXECUTE_CLEANUP.to_owned(),
        Arc::new(ExecuteCleanupHandler(execute_cleanup)),
    );
    handlers.insert(
        job_type::POST_ROOM4_SUMMARY.to_owned(),
        Arc::new(PostRoom4SummaryHandler(post_room4_summary)),
    );
    handlers
}
