//! In-memory reasoners for tests and dry runs.
//!
//! - `ScriptedReasoner`: canned answers per task, optionally per component,
//!   with call recording and an artificial delay
//! - `UnavailableReasoner`: refuses every call with `Unavailable`

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::reasoner::{GenerationError, GenerationRequest, Reasoner, Task};

// ---------------------------------------------------------------------------
// ScriptedReasoner
// ---------------------------------------------------------------------------

type Answer = Result<Value, GenerationError>;

/// Answers from a script. Tasks without a scripted answer are declined
/// with [`GenerationError::Unsupported`].
#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    by_task: HashMap<Task, Answer>,
    /// Keyed by (task, component id); consulted before `by_task`.
    by_subject: HashMap<(Task, String), Answer>,
    delay: Option<Duration>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request of `task` with `output`.
    pub fn respond(mut self, task: Task, output: Value) -> Self {
        self.by_task.insert(task, Ok(output));
        self
    }

    /// Answer requests of `task` about `subject` with `output`. The subject
    /// is the component id, or for relationship tasks the first involved
    /// component.
    pub fn respond_for(mut self, task: Task, subject: &str, output: Value) -> Self {
        self.by_subject.insert((task, subject.to_string()), Ok(output));
        self
    }

    pub fn fail(mut self, task: Task, error: GenerationError) -> Self {
        self.by_task.insert(task, Err(error));
        self
    }

    pub fn fail_for(mut self, task: Task, subject: &str, error: GenerationError) -> Self {
        self.by_subject.insert((task, subject.to_string()), Err(error));
        self
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests received for `task`.
    pub fn calls(&self, task: Task) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task)
            .count()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn subject_of(request: &GenerationRequest) -> Option<String> {
    let ctx = &request.context;
    ctx.get("component_id")
        .and_then(Value::as_str)
        .or_else(|| {
            ctx.get("involved_components")
                .and_then(Value::as_array)
                .and_then(|ids| ids.first())
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        let task = request.task;
        let subject = subject_of(&request);
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        subject
            .and_then(|s| self.by_subject.get(&(task, s)))
            .or_else(|| self.by_task.get(&task))
            .cloned()
            .unwrap_or(Err(GenerationError::Unsupported(task)))
    }
}

// ---------------------------------------------------------------------------
// UnavailableReasoner
// ---------------------------------------------------------------------------

/// A backend that is down.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableReasoner;

#[async_trait]
impl Reasoner for UnavailableReasoner {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<Value, GenerationError> {
        Err(GenerationError::Unavailable(
            "backend is not reachable".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component_request(id: &str) -> GenerationRequest {
        GenerationRequest::new(
            Task::JudgeComponent,
            "",
            "",
            json!({"component_id": id}),
        )
    }

    #[tokio::test]
    async fn test_subject_answer_wins_over_task_answer() {
        let reasoner = ScriptedReasoner::new()
            .respond(Task::JudgeComponent, json!({"compliance_status": "uncertain"}))
            .respond_for(Task::JudgeComponent, "D2", json!({"compliance_status": "compliant"}));

        let a = reasoner.generate(component_request("D1")).await.unwrap();
        let b = reasoner.generate(component_request("D2")).await.unwrap();
        assert_eq!(a["compliance_status"], "uncertain");
        assert_eq!(b["compliance_status"], "compliant");
        assert_eq!(reasoner.calls(Task::JudgeComponent), 2);
    }

    #[tokio::test]
    async fn test_unscripted_task_is_unsupported() {
        let reasoner = ScriptedReasoner::new();
        let err = reasoner.generate(component_request("D1")).await.unwrap_err();
        assert_eq!(err, GenerationError::Unsupported(Task::JudgeComponent));
    }

    #[tokio::test]
    async fn test_unavailable_reasoner_is_fatal() {
        let err = UnavailableReasoner
            .generate(component_request("D1"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
