// Chat and call history records handed to the history store.

use super::UserId;

/// Category of a stored history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Chat,
    Video,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Chat => "chat",
            HistoryKind::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(HistoryKind::Chat),
            "video" => Some(HistoryKind::Video),
            _ => None,
        }
    }
}

/// One event to persist. `local_id` is the party the record belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub local_id: UserId,
    pub remote_id: UserId,
    pub content: String,
    pub kind: HistoryKind,
    // Epoch millis.
    pub timestamp: u64,
}

/// History record as returned to one of the two parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub message: String,
    pub timestamp: u64,
    pub is_self: bool,
    pub kind: HistoryKind,
}

const CALL_DURATION_PREFIX: &str = "Call duration: ";
const CALL_REJECTED: &str = "Call rejected";
const CALL_OFFLINE: &str = "Call missed: callee offline";
const CALL_BUSY: &str = "Call missed: callee busy";
const CALL_CANCELLED: &str = "Call cancelled";

impl HistoryEvent {
    pub fn chat(local_id: UserId, remote_id: UserId, content: String, timestamp: u64) -> Self {
        Self {
            local_id,
            remote_id,
            content,
            kind: HistoryKind::Chat,
            timestamp,
        }
    }

    fn video(local_id: UserId, remote_id: UserId, content: String, timestamp: u64) -> Self {
        Self {
            local_id,
            remote_id,
            content,
            kind: HistoryKind::Video,
            timestamp,
        }
    }

    /// Completed call, recorded by whoever hung up.
    pub fn call_ended(local_id: UserId, remote_id: UserId, started_at: u64, ended_at: u64) -> Self {
        let seconds = duration_secs(started_at, ended_at);
        let content = format!("{CALL_DURATION_PREFIX}{}", format_duration(seconds));
        Self::video(local_id, remote_id, content, ended_at)
    }

    /// Rejected invite, recorded against the caller.
    pub fn call_rejected(caller_id: UserId, rejecter_id: UserId, timestamp: u64) -> Self {
        Self::video(caller_id, rejecter_id, CALL_REJECTED.to_string(), timestamp)
    }

    pub fn callee_offline(caller_id: UserId, callee_id: UserId, timestamp: u64) -> Self {
        Self::video(caller_id, callee_id, CALL_OFFLINE.to_string(), timestamp)
    }

    pub fn callee_busy(caller_id: UserId, callee_id: UserId, timestamp: u64) -> Self {
        Self::video(caller_id, callee_id, CALL_BUSY.to_string(), timestamp)
    }

    pub fn call_cancelled(caller_id: UserId, callee_id: UserId, timestamp: u64) -> Self {
        Self::video(caller_id, callee_id, CALL_CANCELLED.to_string(), timestamp)
    }

    /// Whether this event is between `a` and `b`, in either direction.
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.local_id == a && self.remote_id == b) || (self.local_id == b && self.remote_id == a)
    }

    pub fn into_entry(self, querying_id: UserId) -> HistoryEntry {
        HistoryEntry {
            is_self: self.local_id == querying_id,
            message: self.content,
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }
}

/// Whole seconds between two epoch-millis timestamps; never negative.
pub fn duration_secs(started_at: u64, ended_at: u64) -> u64 {
    ended_at.saturating_sub(started_at) / 1000
}

/// Formats seconds as `HH:MM:SS`; hours keep growing past 99.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_pads_each_component() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(59), "00:00:59");
        assert_eq!(format_duration(3725), "01:02:05");
        assert_eq!(format_duration(100 * 3600), "100:00:00");
    }

    #[test]
    fn duration_is_whole_seconds_and_saturates() {
        assert_eq!(duration_secs(1_000, 4_999), 3);
        assert_eq!(duration_secs(5_000, 1_000), 0);
    }

    #[test]
    fn call_ended_records_formatted_duration_at_end_time() {
        let event = HistoryEvent::call_ended(1, 2, 10_000, 10_000 + 3_725_000);
        assert_eq!(event.content, "Call duration: 01:02:05");
        assert_eq!(event.timestamp, 10_000 + 3_725_000);
        assert_eq!(event.kind, HistoryKind::Video);
        assert_eq!((event.local_id, event.remote_id), (1, 2));
    }

    #[test]
    fn entry_is_self_only_for_the_local_party() {
        let event = HistoryEvent::chat(1, 2, "hi".to_string(), 3);
        assert!(event.is_between(2, 1));
        assert!(event.clone().into_entry(1).is_self);
        assert!(!event.into_entry(2).is_self);
    }

    #[test]
    fn kind_round_trips_through_its_column_value() {
        for kind in [HistoryKind::Chat, HistoryKind::Video] {
            assert_eq!(HistoryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(HistoryKind::parse("audio"), None);
    }
}
