//! In-process collaborators for workflow tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use callintake::adapters::{
    BlobStorage, ChatCompletion, Collaborators, CompletionRequest, DataStore, SpeechToText,
};
use callintake::core::{Operator, ProspectChoice};
use callintake::domain::{
    AudioUpload, CalendarEvent, CallAnalysis, CallRecord, LeadPatch, LeadRef, NewTask,
    ProposedTask, TaskDecision,
};

pub fn wav_upload(size: usize) -> AudioUpload {
    AudioUpload::new("call.wav", "audio/wav", vec![0u8; size])
}

pub const TWO_MIB: usize = 2 * 1024 * 1024;

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: AtomicUsize,
    pub paths: Mutex<Vec<String>>,
}

#[async_trait]
impl BlobStorage for FakeStorage {
    async fn upload(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_string());
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://storage.test/audio/{}", path)
    }
}

pub struct FakeSpeech {
    pub calls: AtomicUsize,
    reply: Result<String, String>,
    delay: Option<Duration>,
}

impl FakeSpeech {
    pub fn returning(text: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Ok(text.to_string()),
            delay: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Err(message.to_string()),
            delay: None,
        }
    }

    pub fn hanging(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Ok(String::new()),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, _upload: &AudioUpload) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// Chat collaborator answering from a queue, in call order
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<Value, String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Value>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, message: &str) {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn push(&self, reply: Value) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_json(&self, request: &CompletionRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }
}

/// Replies for the stages before classification: metadata, format, analysis
pub fn ingest_replies(prospect_label: &str) -> Vec<Value> {
    vec![
        json!({
            "operator_name": "Sam",
            "client_name": "Dana",
            "company_name": "Acme",
            "call_type": "outbound"
        }),
        json!({"formatted_transcript": [{"speaker": "A", "text": "hello"}]}),
        json!({
            "prospectType": prospect_label,
            "summary": "S",
            "keyPoints": ["k1"],
            "nextAction": "call back"
        }),
    ]
}

pub fn task_reply(titles: &[&str]) -> Value {
    let tasks: Vec<Value> = titles.iter().map(|t| json!({"title": t})).collect();
    json!({ "tasks": tasks })
}

/// In-memory data store using the default (compensating) commit
#[derive(Default)]
pub struct MemoryStore {
    pub calls: Mutex<Vec<CallRecord>>,
    pub tasks: Mutex<Vec<NewTask>>,
    pub lead_patches: Mutex<Vec<(String, LeadPatch)>>,
    pub leads: Mutex<Vec<(String, String, LeadRef)>>,
    pub events: Mutex<Vec<CalendarEvent>>,
    pub insert_call_count: AtomicUsize,
    pub insert_tasks_count: AtomicUsize,
    pub delete_count: AtomicUsize,
    pub fail_tasks: bool,
    pub fail_delete: bool,
    pub fail_lead: bool,
    /// Delay before each task insert completes
    pub slow_tasks: Option<Duration>,
    /// Journal file replaced by a directory when a call is inserted
    pub break_journal_on_insert: Mutex<Option<PathBuf>>,
}

impl MemoryStore {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn task_titles(&self) -> Vec<String> {
        self.tasks.lock().unwrap().iter().map(|t| t.title.clone()).collect()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn insert_call(&self, record: &CallRecord) -> Result<String> {
        self.insert_call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(events_path) = self.break_journal_on_insert.lock().unwrap().take() {
            std::fs::remove_file(&events_path)?;
            std::fs::create_dir(&events_path)?;
        }
        let mut calls = self.calls.lock().unwrap();
        let id = format!("call-{}", calls.len() + 1);
        let mut stored = record.clone();
        stored.id = Some(id.clone());
        calls.push(stored);
        Ok(id)
    }

    async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<()> {
        self.insert_tasks_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.slow_tasks {
            tokio::time::sleep(delay).await;
        }
        if self.fail_tasks {
            anyhow::bail!("tasks table unavailable");
        }
        self.tasks.lock().unwrap().extend_from_slice(tasks);
        Ok(())
    }

    async fn delete_call(&self, call_id: &str) -> Result<()> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            anyhow::bail!("delete rejected");
        }
        self.calls
            .lock()
            .unwrap()
            .retain(|c| c.id.as_deref() != Some(call_id));
        Ok(())
    }

    async fn get_call(&self, call_id: &str) -> Result<Option<CallRecord>> {
        Ok(self
            .calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id.as_deref() == Some(call_id))
            .cloned())
    }

    async fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> Result<()> {
        if self.fail_lead {
            anyhow::bail!("lead not found");
        }
        self.lead_patches
            .lock()
            .unwrap()
            .push((lead_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn find_lead(&self, name: &str, company: &str) -> Result<Option<LeadRef>> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .find(|(n, c, _)| n == name && c == company)
            .map(|(_, _, lead)| lead.clone()))
    }

    async fn insert_calendar_event(&self, event: &CalendarEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Fakes plus the collaborator bundle built from them
pub struct Harness {
    pub storage: Arc<FakeStorage>,
    pub speech: Arc<FakeSpeech>,
    pub chat: Arc<ScriptedChat>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(speech: FakeSpeech, chat: ScriptedChat, store: MemoryStore) -> Self {
        Self {
            storage: Arc::new(FakeStorage::default()),
            speech: Arc::new(speech),
            chat: Arc::new(chat),
            store: Arc::new(store),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            storage: self.storage.clone(),
            speech: self.speech.clone(),
            chat: self.chat.clone(),
            store: self.store.clone(),
        }
    }

    /// Calls made to any network-backed collaborator
    pub fn network_calls(&self) -> usize {
        self.storage.uploads.load(Ordering::SeqCst)
            + self.speech.calls.load(Ordering::SeqCst)
            + self.chat.call_count()
            + self.store.insert_call_count.load(Ordering::SeqCst)
    }
}

/// Operator answering from a fixed script
pub struct ScriptedOperator {
    pub choice: ProspectChoice,
    decisions: Mutex<VecDeque<TaskDecision>>,
    pub reviewed: Mutex<Vec<(String, usize, usize)>>,
}

impl ScriptedOperator {
    pub fn new(choice: ProspectChoice, decisions: Vec<TaskDecision>) -> Self {
        Self {
            choice,
            decisions: Mutex::new(decisions.into()),
            reviewed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn confirm_prospect(&self, _analysis: &CallAnalysis) -> Result<ProspectChoice> {
        Ok(self.choice)
    }

    async fn review_task(
        &self,
        task: &ProposedTask,
        position: usize,
        total: usize,
    ) -> Result<TaskDecision> {
        self.reviewed
            .lock()
            .unwrap()
            .push((task.title.clone(), position, total));
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("operator walked away"))
    }
}
