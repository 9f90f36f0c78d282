use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bson::oid::ObjectId;
use mediascribe_services::engine::{EngineError, SpeechEngine};
use mediascribe_services::object_store::{ObjectStore, ObjectStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Transcription { job_id: ObjectId },
    Summarization { job_id: ObjectId },
}

/// In-memory engine double. Accepts every request by default; tests can
/// queue failures that are consumed one invocation at a time.
#[derive(Default)]
pub struct MockSpeechEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    transcription_failures: Mutex<VecDeque<EngineError>>,
    summarization_failures: Mutex<VecDeque<EngineError>>,
}

impl MockSpeechEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_transcription(&self, err: EngineError) {
        self.transcription_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_summarization(&self, err: EngineError) {
        self.summarization_failures.lock().unwrap().push_back(err);
    }

    pub fn transcription_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, EngineCall::Transcription { .. }))
            .count()
    }

    pub fn summarization_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, EngineCall::Summarization { .. }))
            .count()
    }
}

#[async_trait]
impl SpeechEngine for MockSpeechEngine {
    async fn start_transcription(
        &self,
        job_id: ObjectId,
        _audio_url: &str,
        _language: &str,
    ) -> Result<(), EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::Transcription { job_id });
        match self.transcription_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn start_summarization(
        &self,
        job_id: ObjectId,
        _transcript_url: &str,
    ) -> Result<(), EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::Summarization { job_id });
        match self.summarization_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory object store double keyed by the URLs it hands out.
#[derive(Default)]
pub struct MockObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.objects.lock().unwrap().contains_key(url)
    }

    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let url = format!("mock://bucket/{key}");
        self.objects.lock().unwrap().insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), ObjectStoreError> {
        // Deleting an unknown URL is fine, matching the real store.
        self.objects.lock().unwrap().remove(url);
        Ok(())
    }
}
