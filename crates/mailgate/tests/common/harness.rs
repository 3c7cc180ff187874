//! In-memory doubles for the mailbox, storage and queue seams.
//!
//! Each double keeps its state behind an `Arc<Mutex<_>>` so a test can hand
//! the double to the pipeline and still inspect what happened afterwards.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;

use mailgate::mail::{
    AttachmentDescriptor, FolderAccess, MailTransport, MessageFlags, MessageSummary, MessageUid,
    SecurityMode, TransportError, UidRange,
};
use mailgate::notify::{QueueBackend, QueueError};
use mailgate::storage::{StorageBackend, StorageError};
use mailgate::CancelSignal;

/// A remote call observed by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Authenticate,
    OpenMailbox(String),
    FetchSummaries,
    GetBodyPart(u32, usize),
    AddFlags(u32, MessageFlags),
    Expunge,
    Disconnect,
}

#[derive(Default)]
pub struct MailboxState {
    pub connected: bool,
    pub open: bool,
    pub messages: Vec<MessageSummary>,
    pub bodies: HashMap<(u32, usize), Vec<u8>>,
    pub calls: Vec<Call>,
    /// Popped one per `fetch_summaries` call before the real fetch runs.
    pub fetch_faults: VecDeque<TransportError>,
    /// Popped one per `get_body_part` call.
    pub body_faults: VecDeque<TransportError>,
    /// Popped one per `add_flags` call.
    pub flag_faults: VecDeque<TransportError>,
    /// Triggered from inside `fetch_summaries`, which then never completes.
    pub cancel_on_fetch: Option<CancelSignal>,
}

/// Mailbox double with scripted faults.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pub state: Arc<Mutex<MailboxState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(self, summary: MessageSummary, bodies: Vec<Vec<u8>>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for (part, body) in bodies.into_iter().enumerate() {
                state.bodies.insert((summary.uid.0, part), body);
            }
            state.messages.push(summary);
        }
        self
    }

    pub fn fail_fetch(&self, error: TransportError) {
        self.state.lock().unwrap().fetch_faults.push_back(error);
    }

    pub fn fail_body(&self, error: TransportError) {
        self.state.lock().unwrap().body_faults.push_back(error);
    }

    pub fn fail_flags(&self, error: TransportError) {
        self.state.lock().unwrap().flag_faults.push_back(error);
    }

    pub fn cancel_on_fetch(&self, cancel: CancelSignal) {
        self.state.lock().unwrap().cancel_on_fetch = Some(cancel);
    }

    /// Simulates the server dropping the connection.
    pub fn drop_connection(&self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.open = false;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn connects(&self) -> usize {
        self.count(&Call::Connect)
    }

    pub fn remaining_uids(&self) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .map(|m| m.uid.0)
            .collect()
    }

    pub fn flags_of(&self, uid: u32) -> Option<MessageFlags> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.uid.0 == uid)
            .map(|m| m.flags)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn require_open(state: &MailboxState) -> Result<(), TransportError> {
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if !state.open {
            return Err(TransportError::NotAuthenticated);
        }
        Ok(())
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn connect(
        &mut self,
        _host: &str,
        _port: u16,
        _security: SecurityMode,
    ) -> Result<(), TransportError> {
        self.record(Call::Connect);
        self.state.lock().unwrap().connected = true;
        Ok(())
    }

    async fn authenticate(
        &mut self,
        _username: &str,
        _password: &SecretString,
    ) -> Result<(), TransportError> {
        self.record(Call::Authenticate);
        if !self.state.lock().unwrap().connected {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    async fn open_mailbox(
        &mut self,
        folder: &str,
        _access: FolderAccess,
    ) -> Result<(), TransportError> {
        self.record(Call::OpenMailbox(folder.to_string()));
        self.state.lock().unwrap().open = true;
        Ok(())
    }

    async fn fetch_summaries(
        &mut self,
        _range: UidRange,
    ) -> Result<Vec<MessageSummary>, TransportError> {
        self.record(Call::FetchSummaries);
        let hang = {
            let mut state = self.state.lock().unwrap();
            Self::require_open(&state)?;
            if let Some(fault) = state.fetch_faults.pop_front() {
                if matches!(fault, TransportError::Io(_)) {
                    state.connected = false;
                    state.open = false;
                }
                return Err(fault);
            }
            state.cancel_on_fetch.take()
        };

        if let Some(cancel) = hang {
            cancel.cancel();
            std::future::pending::<()>().await;
        }
        Ok(self.state.lock().unwrap().messages.clone())
    }

    async fn get_body_part(
        &mut self,
        uid: MessageUid,
        descriptor: &AttachmentDescriptor,
    ) -> Result<Vec<u8>, TransportError> {
        self.record(Call::GetBodyPart(uid.0, descriptor.part));
        let mut state = self.state.lock().unwrap();
        Self::require_open(&state)?;
        if let Some(fault) = state.body_faults.pop_front() {
            return Err(fault);
        }
        state
            .bodies
            .get(&(uid.0, descriptor.part))
            .cloned()
            .ok_or_else(|| TransportError::PartNotFound {
                uid,
                part: descriptor.part,
                name: descriptor.name.clone(),
            })
    }

    async fn add_flags(
        &mut self,
        uid: MessageUid,
        flags: MessageFlags,
        _silent: bool,
    ) -> Result<(), TransportError> {
        self.record(Call::AddFlags(uid.0, flags));
        let mut state = self.state.lock().unwrap();
        Self::require_open(&state)?;
        if let Some(fault) = state.flag_faults.pop_front() {
            return Err(fault);
        }
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.uid == uid)
            .ok_or(TransportError::MessageNotFound(uid))?;
        message.flags |= flags;
        Ok(())
    }

    async fn expunge(&mut self) -> Result<(), TransportError> {
        self.record(Call::Expunge);
        let mut state = self.state.lock().unwrap();
        Self::require_open(&state)?;
        state.messages.retain(|m| !m.is_deleted());
        Ok(())
    }

    async fn disconnect(&mut self, _quit: bool) -> Result<(), TransportError> {
        self.record(Call::Disconnect);
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.open = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn is_authenticated(&self) -> bool {
        self.state.lock().unwrap().open
    }
}

/// Storage double keeping objects in a map. Names in `failing` never store.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub failing: Mutex<HashSet<String>>,
    pub attempts: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_always(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn stored_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Every store call, successful or not.
    pub fn store_calls(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempts_for(&self, name: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == name)
            .count()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn store(
        &self,
        bytes: &[u8],
        path: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.attempts.lock().unwrap().push(path.to_string());
        if self.failing.lock().unwrap().contains(path) {
            return Err(StorageError::Unavailable(format!("refusing {}", path)));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(format!("memory://attachments/{}", path))
    }

    async fn fetch(&self, path: &str, _content_type: &str) -> Result<Vec<u8>, StorageError> {
        self.object(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }
}

/// How [`MemoryQueue`] answers a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    Accept,
    Timeout,
    Reject,
}

/// Queue double recording accepted bodies. Sends follow `script`, then `fallback`.
pub struct MemoryQueue {
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub script: Mutex<VecDeque<SendResult>>,
    pub fallback: Mutex<SendResult>,
    pub sends: Mutex<usize>,
}

impl MemoryQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(SendResult::Accept),
            sends: Mutex::new(0),
        })
    }

    pub fn script(&self, results: &[SendResult]) {
        self.script.lock().unwrap().extend(results.iter().copied());
    }

    pub fn answer_always(&self, result: SendResult) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn send_count(&self) -> usize {
        *self.sends.lock().unwrap()
    }

    /// Accepted notifications, decoded.
    pub fn notifications(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|body| serde_json::from_slice(body).unwrap())
            .collect()
    }

    pub fn notified_file_names(&self) -> Vec<String> {
        self.notifications()
            .iter()
            .map(|n| n["FileName"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn send(&self, body: Vec<u8>) -> Result<(), QueueError> {
        *self.sends.lock().unwrap() += 1;
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.fallback.lock().unwrap());
        match next {
            SendResult::Accept => {
                self.sent.lock().unwrap().push(body);
                Ok(())
            }
            SendResult::Timeout => Err(QueueError::Timeout {
                topic: "attachments".to_string(),
                timeout_ms: 30_000,
            }),
            SendResult::Reject => Err(QueueError::Rejected("message too large".to_string())),
        }
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn topic_name(&self) -> &str {
        "attachments"
    }

    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
