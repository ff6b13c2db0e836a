use shared::ChatSender;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const CHAT_HISTORY_LIMIT: usize = 500;
pub const BUBBLE_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    /// Seconds since midnight UTC when the line arrived
    pub received_at: u32,
    pub sender: ChatSender,
    pub text: String,
}

impl ChatLine {
    /// `[HH:MM:SS] <label>: <text>`; system lines carry no sender label
    pub fn format(&self, local_id: Option<u32>) -> String {
        let secs = self.received_at;
        let clock = format!(
            "[{:02}:{:02}:{:02}]",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        match self.sender {
            ChatSender::System => format!("{} * {}", clock, self.text),
            ChatSender::Player(id) if Some(id) == local_id => {
                format!("{} You: {}", clock, self.text)
            }
            ChatSender::Player(id) => format!("{} Player {}: {}", clock, id, self.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechBubble {
    pub text: String,
    pub expires_at: Instant,
}

/// Scrollback plus the speech bubbles currently floating over entities
#[derive(Debug, Default)]
pub struct ChatLog {
    lines: VecDeque<ChatLine>,
    bubbles: HashMap<u32, SpeechBubble>,
}

fn seconds_of_day(now: SystemTime) -> u32 {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    (secs % 86_400) as u32
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line, dropping the oldest past the history limit
    pub fn record(&mut self, sender: ChatSender, text: &str) -> &ChatLine {
        self.record_at(sender, text, SystemTime::now())
    }

    pub fn record_at(&mut self, sender: ChatSender, text: &str, at: SystemTime) -> &ChatLine {
        if self.lines.len() == CHAT_HISTORY_LIMIT {
            self.lines.pop_front();
        }
        self.lines.push_back(ChatLine {
            received_at: seconds_of_day(at),
            sender,
            text: text.to_string(),
        });
        &self.lines[self.lines.len() - 1]
    }

    /// A newer message from the same entity replaces its bubble
    pub fn show_bubble(&mut self, entity_id: u32, text: &str, now: Instant) {
        self.bubbles.insert(
            entity_id,
            SpeechBubble {
                text: text.to_string(),
                expires_at: now + BUBBLE_DURATION,
            },
        );
    }

    /// Drops bubbles whose time is up; returns how many were removed
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.bubbles.len();
        self.bubbles.retain(|_, bubble| bubble.expires_at > now);
        before - self.bubbles.len()
    }

    pub fn bubble_for(&self, entity_id: u32) -> Option<&SpeechBubble> {
        self.bubbles.get(&entity_id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &ChatLine> {
        self.lines.iter()
    }

    pub fn last(&self) -> Option<&ChatLine> {
        self.lines.back()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
