//! Prompt template resolution and admin management.

use std::sync::Arc;

use uuid::Uuid;

use triage_storage::{PromptStore, PromptTemplateRecord};

use crate::error::{ServiceError, StageCause};

/// Active system/user prompt pair resolved for one pipeline stage.
#[derive(Debug, Clone)]
pub struct ActivePromptPair {
    pub system: PromptTemplateRecord,
    pub user: PromptTemplateRecord,
}

/// Read-side prompt resolution for the LLM pipeline.
pub struct PromptTemplateService {
    prompts: Arc<dyn PromptStore>,
}

impl PromptTemplateService {
    pub fn new(prompts: Arc<dyn PromptStore>) -> Self {
        Self { prompts }
    }

    /// Resolve the active pair for a stage; absence is retriable with the
    /// stage's cause label so the job backs off until prompts are seeded.
    pub async fn get_required_active_pair(
        &self,
        system_name: &str,
        user_name: &str,
        cause: StageCause,
    ) -> Result<ActivePromptPair, ServiceError> {
        let system = self.require_active(system_name, cause).await?;
        let user = self.require_active(user_name, cause).await?;
        Ok(ActivePromptPair { system, user })
    }

    async fn require_active(
        &self,
        name: &str,
        cause: StageCause,
    ) -> Result<PromptTemplateRecord, ServiceError> {
        self.prompts.get_active_prompt(name).await?.ok_or_else(|| {
            ServiceError::stage(cause, format!("MissingActivePromptTemplate: {name}"))
        })
    }
}

/// Referenced prompt version does not exist.
#[derive(Debug, thiserror::Error)]
#[error("prompt version not found: {name}@{version}")]
pub struct PromptVersionNotFound {
    pub name: String,
    pub version: i32,
}

/// Admin-facing prompt catalog operations.
pub struct PromptManagementService {
    prompts: Arc<dyn PromptStore>,
}

impl PromptManagementService {
    pub fn new(prompts: Arc<dyn PromptStore>) -> Self {
        Self { prompts }
    }

    pub async fn list_versions(&self) -> Result<Vec<PromptTemplateRecord>, ServiceError> {
        Ok(self.prompts.list_prompt_versions().await?)
    }

    pub async fn get_active_version(
        &self,
        name: &str,
    ) -> Result<Option<PromptTemplateRecord>, ServiceError> {
        Ok(self.prompts.get_active_prompt(name).await?)
    }

    pub async fn activate_version(
        &self,
        name: &str,
        version: i32,
        actor_user_id: Option<Uuid>,
    ) -> Result<Result<PromptTemplateRecord, PromptVersionNotFound>, ServiceError> {
        match self.prompts.activate_prompt_version(name, version, actor_user_id).await? {
            Some(record) => Ok(Ok(record)),
            None => {
                Ok(Err(PromptVersionNotFound { name: name.to_owned(), version }))
            }
        }
    }

    /// Derive a new immutable version from an existing one.
    pub async fn create_version_from(
        &self,
        name: &str,
        source_version: i32,
        content: &str,
        actor_user_id: Uuid,
    ) -> Result<Result<PromptTemplateRecord, PromptVersionNotFound>, ServiceError> {
        let source = self.prompts.get_prompt_version(name, source_version).await?;
        if source.is_none() {
            return Ok(Err(PromptVersionNotFound {
                name: name.to_owned(),
                version: source_version,
            }));
        }
        let created =
            self.prompts.create_prompt_version(name, content, Some(actor_user_id)).await?;
        Ok(Ok(created))
    }

    /// Seed the first version of a prompt name (bootstrap path).
    pub async fn seed_version(
        &self,
        name: &str,
        content: &str,
    ) -> Result<PromptTemplateRecord, ServiceError> {
        Ok(self.prompts.create_prompt_version(name, content, None).await?)
    }
}
