#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tailor_core::provider::Result;
use tailor_core::{ChatRequest, ChatResponse, Config, Document, Message, Provider, ProviderError};

/// Hashed bag-of-words embeddings. Can be switched into a failing state to
/// simulate an unreachable embedding endpoint.
pub struct HashEmbedder {
    dims: usize,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn vector(&self, text: &str) -> Result<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("connection refused".into()));
        }

        let mut vector = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphabetic())
                .flat_map(char::to_lowercase)
                .collect();
            if word.is_empty() {
                continue;
            }
            let hash = word
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            vector[(hash % self.dims as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}

#[async_trait]
impl Provider for HashEmbedder {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Err(ProviderError::Other("chat is not supported".into()))
    }

    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vector(text)
    }

    async fn embed_batch(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|text| self.vector(text)).collect()
    }
}

/// Replays scripted chat replies and records every request.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<Message>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(replies: impl IntoIterator<Item = Result<Message>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedChat {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok(message)) => Ok(ChatResponse { model, message }),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::Other("script exhausted".into())),
        }
    }

    async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>> {
        Err(ProviderError::Other("embeddings are not supported".into()))
    }
}

pub fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_path = root.join("data");
    config.storage.docs_path = root.join("docs");
    config.rag.embedding.dims = Some(32);
    config.rag.fuzzy_k = 5;
    config.rag.semantic_k = 1;
    config.llm.max_retries = 3;
    config.llm.retry_backoff_ms = 1;
    config
}

pub fn travel_corpus() -> Vec<Document> {
    vec![
        Document::new(
            "paris.txt",
            "Paris is the capital of France. The Eiffel Tower is its most famous landmark.",
        ),
        Document::new(
            "tokyo.txt",
            "Tokyo is the capital of Japan. Visitors climb the Tokyo Skytree and see Senso-ji temple.",
        ),
    ]
}
