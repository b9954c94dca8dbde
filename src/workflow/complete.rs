use std::sync::Arc;

use ideaworks_common::{
    DemoDescriptor, FileChange, IdeaRef, IdeaStatus, WorkMeta, WorkType, normalize_id,
    normalize_tags, parse_idea_id, slugify,
};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::scaffold::{completion_body, iso_date, work_body_path, work_meta_path, work_plan};
use super::slug::resolve_work_slug;
use super::{Clock, completion_branch_name, system_clock};
use crate::errors::{HostingError, WorkflowError};
use crate::hosting::{ContentPublisher, PublishRequest, PullRequestDraft};
use crate::store::IdeaStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteInput {
    /// `author/slug`
    pub idea_id: String,
    pub implement_author_id: String,
    pub work_type: WorkType,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteOutput {
    pub pr_url: String,
    /// `implementer/slug`
    pub work_id: String,
    pub branch: String,
}

/// Publishes a finished work for an idea and marks the idea done, all in one
/// commit on a deterministic branch.
///
/// The idea's `meta.yml` in the content repository is the source of truth for
/// the done transition. An attached store is only read, as an early reject.
pub struct CompletionWorkflow {
    publisher: ContentPublisher,
    store: Option<Arc<dyn IdeaStore>>,
    clock: Clock,
}

/// The parts of an idea's `meta.yml` the completion reads and rewrites.
struct IdeaMeta {
    doc: Mapping,
}

impl IdeaMeta {
    fn parse(raw: &str) -> Result<Self, HostingError> {
        let decode = |message: String| HostingError::Decode {
            step: "read idea meta",
            message,
        };
        let value: Value = serde_yaml::from_str(raw).map_err(|e| decode(e.to_string()))?;
        let doc = match value {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => return Err(decode("meta.yml is not a mapping".to_string())),
        };
        Ok(Self { doc })
    }

    fn text(&self, key: &str) -> Option<String> {
        self.doc
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn tags(&self) -> Vec<String> {
        let raw: Vec<&str> = self
            .doc
            .get("tags")
            .and_then(Value::as_sequence)
            .map(|seq| seq.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        normalize_tags(raw)
    }

    fn status(&self) -> IdeaStatus {
        self.doc
            .get("idea")
            .and_then(|idea| idea.get("status"))
            .and_then(Value::as_str)
            .map(IdeaStatus::normalize)
            .unwrap_or_default()
    }

    /// Set `idea.status = done` and `idea.implementedWorkId`, keeping every
    /// other key untouched.
    fn mark_done(&mut self, work_id: &str) {
        let mark = |idea: &mut Mapping| {
            idea.insert(Value::from("status"), Value::from(IdeaStatus::Done.as_str()));
            idea.insert(Value::from("implementedWorkId"), Value::from(work_id));
        };
        match self.doc.get_mut("idea") {
            Some(Value::Mapping(idea)) => mark(idea),
            _ => {
                let mut idea = Mapping::new();
                mark(&mut idea);
                self.doc.insert(Value::from("idea"), Value::Mapping(idea));
            }
        }
    }

    fn render(&self) -> Result<String, HostingError> {
        serde_yaml::to_string(&self.doc).map_err(|e| HostingError::Encode {
            step: "render idea meta",
            message: e.to_string(),
        })
    }
}

impl CompletionWorkflow {
    pub fn new(publisher: ContentPublisher) -> Self {
        Self {
            publisher,
            store: None,
            clock: system_clock(),
        }
    }

    /// Also reject ideas the store already records as done.
    pub fn with_store(mut self, store: Arc<dyn IdeaStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn complete(&self, input: CompleteInput) -> Result<CompleteOutput, WorkflowError> {
        let span = info_span!(
            "complete",
            request_id = %Uuid::new_v4(),
            idea = %input.idea_id.trim(),
        );
        self.run(input).instrument(span).await
    }

    async fn run(&self, input: CompleteInput) -> Result<CompleteOutput, WorkflowError> {
        let idea: IdeaRef = parse_idea_id(&input.idea_id)?;
        let implementer = normalize_id(&input.implement_author_id, "implementAuthorId")?;
        let idea_id = idea.to_string();
        let base = self.publisher.base_branch().to_string();
        let api = self.publisher.api();

        let meta_path = work_meta_path(&idea.author_id, &idea.slug);
        let raw_meta = api
            .read_text_file(&meta_path, &base)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("idea {idea_id} not found")))?;
        let mut meta = IdeaMeta::parse(&raw_meta)?;

        if meta.status().is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "idea {idea_id} is already implemented"
            )));
        }
        if let Some(store) = &self.store {
            let row = store
                .find(&idea.author_id, &idea.slug)
                .await
                .map_err(WorkflowError::Store)?;
            if row.is_some_and(|r| r.status.is_terminal()) {
                return Err(WorkflowError::Conflict(format!(
                    "idea {idea_id} is already implemented"
                )));
            }
        }

        let body_path = work_body_path(&idea.author_id, &idea.slug);
        let idea_body = api.read_text_file(&body_path, &base).await?.ok_or_else(|| {
            WorkflowError::NotFound(format!("idea {idea_id} has no index.mdx"))
        })?;

        let idea_title = meta.text("title");
        let title = input
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| idea_title.clone())
            .unwrap_or_else(|| idea_id.clone());
        let summary = meta
            .text("summary")
            .or(idea_title)
            .unwrap_or_else(|| title.clone());

        let base_slug = slugify(&title, "work");
        let work_slug = resolve_work_slug(api, &implementer, &base_slug, &base).await?;
        let work_id = format!("{implementer}/{work_slug}");

        let work_meta = WorkMeta {
            title: title.clone(),
            summary,
            work_type: input.work_type,
            date: iso_date((self.clock)()),
            draft: None,
            source_idea_id: Some(idea_id.clone()),
            tags: meta.tags(),
            demo: DemoDescriptor::iframe(&implementer, &work_slug),
        };
        meta.mark_done(&work_id);

        let mut plan = work_plan(
            &implementer,
            &work_slug,
            &work_meta,
            completion_body(&title, &idea_id, &idea_body),
        )?;
        plan.push(FileChange::text(meta_path, meta.render()?));

        let branch = completion_branch_name(&implementer, &idea.author_id, &idea.slug);
        let request = PublishRequest {
            base_branch: base,
            branch_name: branch.clone(),
            commit_message: format!(
                "feat({}): {work_id} implements {idea_id}",
                input.work_type
            ),
            plan,
            pull_request: PullRequestDraft {
                title: format!("{title} (implements {idea_id})"),
                body: format!("Implements idea: {idea_id}\n\nWork: {work_id}"),
            },
        };
        let outcome = self.publisher.publish(&request).await?;

        info!(pr = %outcome.pr_url, work = %work_id, "Completion published");
        Ok(CompleteOutput {
            pr_url: outcome.pr_url,
            work_id,
            branch,
        })
    }
}
