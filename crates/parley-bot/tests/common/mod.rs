#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_bot::conversation::{ConversationService, ConversationSettings};
use parley_bot::dispatcher::ReplyPoster;
use parley_bot::images::{ImageError, ImageResolver};
use parley_llm::{ChatClient, ChatRequest, ChatResponse, LlmError, RetryPolicy};
use parley_persist::InMemoryConversationStore;

/// Replays queued results; answers "ok" once the queue is drained
#[derive(Default)]
pub struct ScriptedChatClient {
    script: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, text: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(ChatResponse::from_text(text)));
        self
    }

    pub fn push_error(&self, error: LlmError) -> &Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat(&self, request: ChatRequest) -> parley_llm::error::Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ChatResponse::from_text("ok")))
    }
}

pub fn rate_limited() -> LlmError {
    LlmError::RateLimited {
        body: r#"{"error":{"type":"rate_limit_exceeded"}}"#.to_string(),
    }
}

/// Resolves every reference to a fixed PNG data URI, or fails on demand
#[derive(Default)]
pub struct StaticImageResolver {
    fail: bool,
    calls: AtomicUsize,
}

impl StaticImageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn data_uri_for(reference: &str) -> String {
    format!("data:image/png;base64,{}", reference.len())
}

#[async_trait]
impl ImageResolver for StaticImageResolver {
    async fn resolve(&self, reference: &str) -> Result<String, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ImageError::Fetch {
                status: 404,
                text: "Not Found".to_string(),
            });
        }
        Ok(data_uri_for(reference))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostedReply {
    pub channel: String,
    pub thread_ts: String,
    pub text: String,
}

#[derive(Default)]
pub struct RecordingPoster {
    posted: Mutex<Vec<PostedReply>>,
}

impl RecordingPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> Vec<PostedReply> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyPoster for RecordingPoster {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> anyhow::Result<()> {
        self.posted.lock().unwrap().push(PostedReply {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

pub fn test_settings() -> ConversationSettings {
    ConversationSettings {
        retry: RetryPolicy::fixed(3, Duration::from_millis(1)),
        ..ConversationSettings::default()
    }
}

pub struct Harness {
    pub store: Arc<InMemoryConversationStore>,
    pub llm: Arc<ScriptedChatClient>,
    pub images: Arc<StaticImageResolver>,
    pub service: Arc<ConversationService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_images(StaticImageResolver::new())
    }

    pub fn with_images(images: StaticImageResolver) -> Self {
        let store = Arc::new(InMemoryConversationStore::new());
        let llm = Arc::new(ScriptedChatClient::new());
        let images = Arc::new(images);
        let service = Arc::new(ConversationService::new(
            store.clone(),
            llm.clone(),
            images.clone(),
            test_settings(),
        ));
        Self {
            store,
            llm,
            images,
            service,
        }
    }
}
