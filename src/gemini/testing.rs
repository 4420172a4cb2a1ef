//! Scripted model backend for unit tests.

use super::provider::{Connector, Credentials, ModelBackend, ModelProvider, OutputSchema};
use super::ContentGenerator;
use crate::error::{Result, StudyError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    schemas: Mutex<Vec<Option<String>>>,
    sends: AtomicUsize,
    connects: AtomicUsize,
    max_connects: Mutex<Option<usize>>,
}

/// Acts as both connector and backend; every clone shares one script.
#[derive(Clone, Default)]
pub(crate) struct FakeModel {
    state: Arc<FakeState>,
}

impl FakeModel {
    pub(crate) fn new() -> Self {
        FakeModel::default()
    }

    pub(crate) fn reply(self, text: &str) -> Self {
        self.state
            .replies
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
        self
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        self.state
            .replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Allow `n` successful connects, refuse the rest
    pub(crate) fn refuse_connects_after(self, n: usize) -> Self {
        *self.state.max_connects.lock().unwrap() = Some(n);
        self
    }

    pub(crate) fn sends(&self) -> usize {
        self.state.sends.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.state.prompts.lock().unwrap().clone()
    }

    pub(crate) fn schemas(&self) -> Vec<Option<String>> {
        self.state.schemas.lock().unwrap().clone()
    }

    pub(crate) fn provider(&self) -> ModelProvider {
        ModelProvider::with_connector(Credentials::fixed("test-key"), Arc::new(self.clone()))
    }

    pub(crate) fn generator(&self) -> ContentGenerator {
        ContentGenerator::new(self.provider())
    }
}

impl Connector for FakeModel {
    fn connect(&self, _api_key: &str) -> Result<Arc<dyn ModelBackend>> {
        let attempt = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(max) = *self.state.max_connects.lock().unwrap() {
            if attempt > max {
                return Err(StudyError::Model("connection refused".to_string()));
            }
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ModelBackend for FakeModel {
    async fn generate(&self, prompt: &str, schema: Option<&OutputSchema>) -> Result<String> {
        self.state.sends.fetch_add(1, Ordering::SeqCst);
        self.state.prompts.lock().unwrap().push(prompt.to_string());
        self.state
            .schemas
            .lock()
            .unwrap()
            .push(schema.map(|s| s.name().to_string()));

        match self.state.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(StudyError::Model(message)),
            None => Err(StudyError::Model("no scripted reply".to_string())),
        }
    }
}
