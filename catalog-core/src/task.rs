//! Task Descriptor / Job Param / Related Spec / Page data model (see §3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state of a Task Descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
}

/// Outcome status of a Task Descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Ok,
    Error,
    Unchanged,
    Unknown,
}

/// Response format the task asks the worker to deliver results in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Tar,
}

impl ResponseFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "json" => Some(ResponseFormat::Json),
            "tar" => Some(ResponseFormat::Tar),
            _ => None,
        }
    }
}

/// One unit of upstream work inside a task (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParam {
    pub method: String,
    pub href_slug: String,
    #[serde(default)]
    pub fetch_all_pages: bool,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub apply_filter: Option<String>,
    #[serde(default)]
    pub refresh_interval_seconds: Option<u64>,
    #[serde(default)]
    pub fetch_related: Vec<RelatedSpec>,
    #[serde(default = "default_page_prefix")]
    pub page_prefix: String,
}

fn default_page_prefix() -> String {
    "page".to_string()
}

impl JobParam {
    /// Drop related specs with an empty `href_slug` at parse time (§3 invariant).
    pub fn normalize(mut self) -> Self {
        self.fetch_related.retain(|r| !r.href_slug_attr.is_empty());
        self
    }
}

/// A rule for expanding one page's results into follow-up GETs (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedSpec {
    pub href_slug_attr: String,
    #[serde(default)]
    pub predicate_attr: Option<String>,
    #[serde(default)]
    pub apply_filter: Option<String>,
}

/// A named JSON document produced by a Work Unit (§3).
#[derive(Debug, Clone)]
pub struct Page {
    pub name: String,
    pub data: Vec<u8>,
}

/// The `Input` sub-document of a Task Descriptor (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInput {
    pub response_format: String,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub jobs: Vec<JobParam>,
    #[serde(default)]
    pub previous_sha: Option<String>,
    #[serde(default)]
    pub previous_size: Option<u64>,
}

/// The orchestrator-visible record of a request (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: String,
    pub state: TaskState,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    pub input: TaskInput,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// The last path segment of a task URL, used both for log correlation and
/// as the `<task-id>` embedded in the ingress upload's content-type (§6).
pub fn task_id_from_url(task_url: &str) -> String {
    task_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(task_url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_is_last_path_segment() {
        assert_eq!(
            task_id_from_url("https://orchestrator/api/tasks/abc-123"),
            "abc-123"
        );
        assert_eq!(
            task_id_from_url("https://orchestrator/api/tasks/abc-123/"),
            "abc-123"
        );
    }

    #[test]
    fn normalize_drops_empty_href_slug_related_specs() {
        let job = JobParam {
            method: "get".into(),
            href_slug: "/api/v2/x".into(),
            fetch_all_pages: false,
            params: Map::new(),
            apply_filter: None,
            refresh_interval_seconds: None,
            fetch_related: vec![
                RelatedSpec {
                    href_slug_attr: "".into(),
                    predicate_attr: None,
                    apply_filter: None,
                },
                RelatedSpec {
                    href_slug_attr: "related".into(),
                    predicate_attr: None,
                    apply_filter: None,
                },
            ],
            page_prefix: "page".into(),
        }
        .normalize();
        assert_eq!(job.fetch_related.len(), 1);
        assert_eq!(job.fetch_related[0].href_slug_attr, "related");
    }
}
