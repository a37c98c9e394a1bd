//! Chat sessions: the active mode, the visible message list and the raw
//! history window that is fed back to the model.
//!
//! Request builders never look at a live [`Session`]; they get a
//! [`SessionSnapshot`] taken before the network call, so switching modes
//! mid-request cannot change what is being sent.

use crate::llm::InlineImage;
use crate::markdown::render_markdown;
use crate::preview::extract_preview;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Raw history kept per session; the widest provider window is 5.
pub const HISTORY_CAP: usize = 10;
pub const MAX_SESSIONS: usize = 1000;
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Study,
    Code,
    Normal,
    Image,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Study, Mode::Code, Mode::Normal, Mode::Image];

    /// Code mode renders into the IDE preview instead of chat bubbles.
    pub fn uses_preview(self) -> bool {
        matches!(self, Mode::Code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Study => "study",
            Mode::Code => "code",
            Mode::Normal => "normal",
            Mode::Image => "image",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "assistant")]
    Ai,
}

impl Sender {
    pub fn label(self) -> &'static str {
        match self {
            Sender::User => "USER",
            Sender::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub is_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_code: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_html: Option<String>,
}

impl Message {
    fn new(sender: Sender, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            sender,
            is_image: false,
            image_url: None,
            has_code: None,
            combined_html: None,
        }
    }
}

/// One entry of prompt context. Raw text, never rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub content: String,
    pub sender: Sender,
    #[serde(default)]
    pub is_image: bool,
}

impl HistoryEntry {
    /// How the entry reads inside a folded text prompt.
    pub fn prompt_text(&self) -> &str {
        if self.is_image {
            "[Image]"
        } else {
            &self.content
        }
    }
}

/// Trailing `window` entries, oldest first.
pub fn trailing(history: &[HistoryEntry], window: usize) -> Vec<HistoryEntry> {
    let start = history.len().saturating_sub(window);
    history[start..].to_vec()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub mode: Mode,
    pub messages: Vec<Message>,
    #[serde(skip)]
    history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mode,
            messages: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn snapshot(&self, window: usize) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            history: trailing(&self.history, window),
        }
    }

    pub fn push_user(&mut self, text: &str) -> &Message {
        self.remember(HistoryEntry {
            content: text.to_string(),
            sender: Sender::User,
            is_image: false,
        });
        self.push_message(Message::new(Sender::User, text.to_string()))
    }

    pub fn push_image(&mut self, image: &InlineImage) -> &Message {
        let url = image.data_url();
        self.remember(HistoryEntry {
            content: url.clone(),
            sender: Sender::User,
            is_image: true,
        });
        let mut message = Message::new(Sender::User, url.clone());
        message.is_image = true;
        message.image_url = Some(url);
        self.push_message(message)
    }

    /// Record a model reply for a request sent in `mode`. Code mode keeps the
    /// raw text and attaches the assembled preview; the other modes render
    /// markdown.
    pub fn push_ai(&mut self, raw: &str, mode: Mode) -> &Message {
        self.remember(HistoryEntry {
            content: raw.to_string(),
            sender: Sender::Ai,
            is_image: false,
        });
        let message = if mode.uses_preview() {
            let combined = extract_preview(raw);
            let mut message = Message::new(Sender::Ai, raw.to_string());
            message.has_code = Some(combined.is_some());
            message.combined_html = combined;
            message
        } else {
            Message::new(Sender::Ai, render_markdown(raw))
        };
        self.push_message(message)
    }

    /// Plain notice shown in place of a reply when the action failed.
    pub fn push_notice(&mut self, text: &str) -> &Message {
        self.push_message(Message::new(Sender::Ai, text.to_string()))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.history.clear();
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn remember(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        if self.history.len() > HISTORY_CAP {
            let excess = self.history.len() - HISTORY_CAP;
            self.history.drain(..excess);
        }
    }

    fn push_message(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}

struct StoredSession {
    session: Session,
    last_used: Instant,
}

/// Live sessions for this process. Nothing here survives a restart.
///
/// Sessions idle for longer than the TTL are dropped when a new one is
/// created; at capacity the least recently used one goes.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(MAX_SESSIONS, SESSION_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, mode: Mode) -> Session {
        let session = Session::new(mode);
        let mut sessions = self.lock();

        let before = sessions.len();
        sessions.retain(|_, stored| stored.last_used.elapsed() < self.idle_ttl);
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, stored)| stored.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "dropped idle sessions");
        }

        sessions.insert(
            session.id.clone(),
            StoredSession {
                session: session.clone(),
                last_used: Instant::now(),
            },
        );
        session
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.lock().get_mut(id).map(|stored| {
            stored.last_used = Instant::now();
            stored.session.clone()
        })
    }

    /// Run `f` against a session under the lock. Callers must not await
    /// inside `f`.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.lock().get_mut(id).map(|stored| {
            stored.last_used = Instant::now();
            f(&mut stored.session)
        })
    }

    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("code".parse::<Mode>().unwrap(), Mode::Code);
        assert_eq!(" Study ".parse::<Mode>().unwrap(), Mode::Study);
        assert!("poetry".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Study);
        assert!(Mode::Code.uses_preview());
        assert!(!Mode::Image.uses_preview());
    }

    #[test]
    fn test_snapshot_takes_trailing_window() {
        let mut session = Session::new(Mode::Study);
        for i in 0..6 {
            session.push_user(&format!("q{}", i));
        }
        let snap = session.snapshot(3);
        let texts: Vec<_> = snap.history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(texts, vec!["q3", "q4", "q5"]);
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_changes() {
        let mut session = Session::new(Mode::Study);
        session.push_user("first");
        let snap = session.snapshot(10);
        session.set_mode(Mode::Code);
        session.push_user("second");
        assert_eq!(snap.mode, Mode::Study);
        assert_eq!(snap.history.len(), 1);
    }

    #[test]
    fn test_code_mode_reply_carries_preview() {
        let mut session = Session::new(Mode::Code);
        let msg = session.push_ai("```html\n<p>hi</p>\n```", Mode::Code).clone();
        assert_eq!(msg.has_code, Some(true));
        assert!(msg.combined_html.unwrap().contains("<p>hi</p>"));
        assert_eq!(msg.content, "```html\n<p>hi</p>\n```");

        let msg = session.push_ai("no code here", Mode::Code).clone();
        assert_eq!(msg.has_code, Some(false));
        assert!(msg.combined_html.is_none());
    }

    #[test]
    fn test_study_reply_is_rendered_but_history_stays_raw() {
        let mut session = Session::new(Mode::Study);
        let msg = session.push_ai("## Answer", Mode::Study).clone();
        assert_eq!(msg.content, "<h2>Answer</h2>");
        assert_eq!(session.snapshot(1).history[0].content, "## Answer");
    }

    #[test]
    fn test_image_message_and_history_placeholder() {
        let mut session = Session::new(Mode::Image);
        let image = InlineImage {
            mime_type: "image/png".into(),
            data: "iVBORw0KGgo=".into(),
        };
        let msg = session.push_image(&image).clone();
        assert!(msg.is_image);
        assert_eq!(msg.image_url.as_deref(), Some("data:image/png;base64,iVBORw0KGgo="));
        assert_eq!(session.snapshot(1).history[0].prompt_text(), "[Image]");
    }

    #[test]
    fn test_store_update_and_clear() {
        let store = SessionStore::new();
        let session = store.create(Mode::Normal);
        store.update(&session.id, |s| {
            s.push_user("hello");
        });
        assert_eq!(store.get(&session.id).unwrap().messages.len(), 1);
        store.update(&session.id, Session::clear);
        let cleared = store.get(&session.id).unwrap();
        assert!(cleared.messages.is_empty());
        assert!(cleared.snapshot(5).history.is_empty());
        assert!(store.update("missing", |s| s.mode).is_none());
        assert!(store.remove(&session.id));
        assert!(!store.remove(&session.id));
        assert!(store.get(&session.id).is_none());
    }

    #[test]
    fn test_history_is_capped() {
        let mut session = Session::new(Mode::Study);
        for i in 0..(HISTORY_CAP + 5) {
            session.push_user(&format!("q{}", i));
        }
        assert_eq!(session.history.len(), HISTORY_CAP);
        assert_eq!(session.history[0].content, "q5");
        assert_eq!(session.messages.len(), HISTORY_CAP + 5);
        let last = session.snapshot(3);
        assert_eq!(last.history[2].content, format!("q{}", HISTORY_CAP + 4));
    }

    #[test]
    fn test_store_evicts_least_recently_used_at_capacity() {
        let store = SessionStore::with_limits(2, SESSION_IDLE_TTL);
        let a = store.create(Mode::Study);
        std::thread::sleep(Duration::from_millis(2));
        let b = store.create(Mode::Study);
        std::thread::sleep(Duration::from_millis(2));
        assert!(store.get(&a.id).is_some());
        std::thread::sleep(Duration::from_millis(2));
        let c = store.create(Mode::Code);
        assert_eq!(store.len(), 2);
        assert!(store.get(&a.id).is_some());
        assert!(store.get(&b.id).is_none());
        assert!(store.get(&c.id).is_some());
    }

    #[test]
    fn test_store_drops_idle_sessions() {
        let store = SessionStore::with_limits(MAX_SESSIONS, Duration::ZERO);
        let stale = store.create(Mode::Study);
        let fresh = store.create(Mode::Study);
        assert!(store.get(&stale.id).is_none());
        assert!(store.get(&fresh.id).is_some());
        assert_eq!(store.len(), 1);
    }
}
