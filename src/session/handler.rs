//! The capability bundle a session uses to reach the outside world.
//!
//! `io_write` and `io_close` are mandatory; everything else is optional and
//! simply skipped when absent. Callbacks are `Send` so the owning session can
//! be moved into a task.

use crate::protocol::message::{PrivacyInfo, UserStatus};
use crate::session::state::{SessionState, StateInfo};
use std::fmt;
use std::io;

pub type WriteFn = dyn FnMut(&[u8]) -> io::Result<()> + Send;
pub type CloseFn = dyn FnMut() + Send;
pub type StateChangeFn = dyn FnMut(SessionState, &StateInfo) + Send;
pub type AdminFn = dyn FnMut(&str) + Send;
pub type UserStatusFn = dyn FnMut(&UserStatus) + Send;
pub type PrivacyFn = dyn FnMut(&PrivacyInfo) + Send;
pub type ClearFn = dyn FnOnce() + Send;

#[derive(Default)]
pub struct SessionHandler {
    pub(crate) io_write: Option<Box<WriteFn>>,
    pub(crate) io_close: Option<Box<CloseFn>>,
    pub(crate) on_state_change: Option<Box<StateChangeFn>>,
    pub(crate) on_admin: Option<Box<AdminFn>>,
    pub(crate) on_set_user_status: Option<Box<UserStatusFn>>,
    pub(crate) on_set_privacy_info: Option<Box<PrivacyFn>>,
    pub(crate) clear: Option<Box<ClearFn>>,
}

impl SessionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write all of `bytes` to the transport or fail. Partial writes are the
    /// callback's problem.
    pub fn on_io_write<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[u8]) -> io::Result<()> + Send + 'static,
    {
        self.io_write = Some(Box::new(f));
        self
    }

    /// Close the transport. Must be safe to call when nothing was ever connected.
    pub fn on_io_close<F>(mut self, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.io_close = Some(Box::new(f));
        self
    }

    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: FnMut(SessionState, &StateInfo) + Send + 'static,
    {
        self.on_state_change = Some(Box::new(f));
        self
    }

    /// Broadcast text from the server administrator.
    pub fn on_admin<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_admin = Some(Box::new(f));
        self
    }

    pub fn on_set_user_status<F>(mut self, f: F) -> Self
    where
        F: FnMut(&UserStatus) + Send + 'static,
    {
        self.on_set_user_status = Some(Box::new(f));
        self
    }

    pub fn on_set_privacy_info<F>(mut self, f: F) -> Self
    where
        F: FnMut(&PrivacyInfo) + Send + 'static,
    {
        self.on_set_privacy_info = Some(Box::new(f));
        self
    }

    /// Called once when the session is freed.
    pub fn on_clear<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.clear = Some(Box::new(f));
        self
    }

    /// Name of the first mandatory callback that is missing.
    pub(crate) fn missing_mandatory(&self) -> Option<&'static str> {
        if self.io_write.is_none() {
            Some("io_write")
        } else if self.io_close.is_none() {
            Some("io_close")
        } else {
            None
        }
    }
}

impl fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandler")
            .field("io_write", &self.io_write.is_some())
            .field("io_close", &self.io_close.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_admin", &self.on_admin.is_some())
            .field("on_set_user_status", &self.on_set_user_status.is_some())
            .field("on_set_privacy_info", &self.on_set_privacy_info.is_some())
            .field("clear", &self.clear.is_some())
            .finish()
    }
}
