use std::time::{SystemTime, UNIX_EPOCH};

/// Actions that count against a caller's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    Post,
    Comment,
    Like,
    Bookmark,
    Subscribe,
    Login,
    Register,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Like => "like",
            Self::Bookmark => "bookmark",
            Self::Subscribe => "subscribe",
            Self::Login => "login",
            Self::Register => "register",
        }
    }

    /// Limit and window for the action. Login and register are keyed by IP,
    /// everything else by user.
    pub fn quota(&self) -> (u32, RateWindow) {
        match self {
            Self::Post => (20, RateWindow::Hour),
            Self::Comment => (120, RateWindow::Hour),
            Self::Like => (600, RateWindow::Hour),
            Self::Bookmark => (600, RateWindow::Hour),
            Self::Subscribe => (200, RateWindow::Hour),
            Self::Login => (30, RateWindow::Hour),
            Self::Register => (10, RateWindow::Day),
        }
    }
}

/// Time window for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Hour,
    Day,
}

impl RateWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
            RateWindow::Day => 86400,
        }
    }
}

/// Calculate current window timestamp for rate limiting
pub fn current_window(window_seconds: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    now / window_seconds
}
