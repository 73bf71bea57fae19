use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_LOG_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Info,
    Request,
    Response,
    Failure,
    Settings,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub text: String,
    pub kind: Kind,
}

/// Fixed-size buffer that forgets its oldest line once full.
struct ActivityLog {
    lines: VecDeque<Entry>,
    capacity: usize,
}

impl ActivityLog {
    fn new(capacity: usize) -> Self {
        ActivityLog {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, entry: Entry) {
        if self.lines.len() >= self.capacity { self.lines.pop_front(); }
        self.lines.push_back(entry);
    }

    fn recent(&self, n: usize) -> Vec<Entry> {
        let len = self.lines.len();
        let take = n.min(len);
        self.lines.iter().skip(len - take).cloned().collect()
    }
}

static ACTIVITY_LOG: Lazy<Mutex<ActivityLog>> = Lazy::new(|| Mutex::new(ActivityLog::new(MAX_LOG_LINES)));

pub fn log<T: Into<String>>(line: T) {
    log_with(Kind::Info, line);
}

pub fn log_with<T: Into<String>>(kind: Kind, line: T) {
    if let Ok(mut buf) = ACTIVITY_LOG.lock() {
        let s = line.into();
        debug_eprintln!("[activity] {:?}: {}", kind, s);
        buf.push(Entry { text: s, kind });
    }
}

pub fn latest() -> Option<Entry> {
    ACTIVITY_LOG.lock().ok().and_then(|buf| buf.recent(1).pop())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> Entry {
        Entry { text: text.to_string(), kind: Kind::Info }
    }

    #[test]
    fn test_recent_returns_newest_in_order() {
        let mut log = ActivityLog::new(10);
        log.push(entry("GET /v1/models"));
        log.push(Entry { text: "GET /v1/models -> 200 OK".to_string(), kind: Kind::Response });
        log.push(entry("POST /v1/chat/completions"));

        let last_two = log.recent(2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].text, "GET /v1/models -> 200 OK");
        assert_eq!(last_two[0].kind, Kind::Response);
        assert_eq!(last_two[1].text, "POST /v1/chat/completions");
        assert_eq!(log.recent(100).len(), 3);
    }

    #[test]
    fn test_oldest_lines_are_dropped() {
        let mut log = ActivityLog::new(3);
        for i in 0..5 {
            log.push(entry(&format!("line {}", i)));
        }

        let texts: Vec<String> = log.recent(10).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_global_log_has_latest() {
        log_with(Kind::Settings, "settings touched");
        assert!(latest().is_some());
    }
}
