use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Backend, Credential, GenerateOutcome, GenerateRequest, GenerateResponse, ModelDescriptor};

/// Replays queued outcomes per model and records every call it receives.
pub struct ScriptedBackend {
    models: Mutex<Result<Vec<ModelDescriptor>, String>>,
    outcomes: Mutex<HashMap<String, VecDeque<GenerateOutcome>>>,
    calls: Mutex<Vec<GenerateRequest>>,
    list_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            models: Mutex::new(Ok(Vec::new())),
            outcomes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_models(self, names: &[&str]) -> Self {
        *self.models.lock().unwrap() = Ok(names
            .iter()
            .map(|n| ModelDescriptor {
                name: n.to_string(),
                supports_generation: true,
            })
            .collect());
        self
    }

    pub fn with_descriptors(self, descriptors: Vec<ModelDescriptor>) -> Self {
        *self.models.lock().unwrap() = Ok(descriptors);
        self
    }

    pub fn with_listing_error(self, reason: &str) -> Self {
        *self.models.lock().unwrap() = Err(reason.to_string());
        self
    }

    pub fn push(&self, model: &str, outcome: GenerateOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn push_text(&self, model: &str, text: &str) {
        self.push(model, success(model, text));
    }

    pub fn push_status(&self, model: &str, code: u16) {
        self.push(
            model,
            GenerateOutcome::Failure {
                code,
                message: format!("status {code}"),
            },
        );
    }

    pub fn calls(&self) -> Vec<GenerateRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn called_models(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

pub fn success(model: &str, text: &str) -> GenerateOutcome {
    GenerateOutcome::Success(GenerateResponse {
        content: text.to_string(),
        model: model.to_string(),
        input_tokens: 10,
        output_tokens: 20,
        finish_reason: "STOP".to_string(),
    })
}

#[async_trait::async_trait]
impl Backend for ScriptedBackend {
    async fn list_models(&self, _credential: &Credential) -> anyhow::Result<Vec<ModelDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.models
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| anyhow::anyhow!(reason))
    }

    async fn generate(&self, _credential: &Credential, req: &GenerateRequest) -> GenerateOutcome {
        self.calls.lock().unwrap().push(req.clone());
        self.outcomes
            .lock()
            .unwrap()
            .get_mut(&req.model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| GenerateOutcome::Failure {
                code: 404,
                message: format!("models/{} is not found", req.model),
            })
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn server_address(&self) -> &str {
        "localhost"
    }
}
