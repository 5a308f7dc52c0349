//! Typed client data slot with an optional cleanup hook.

use std::any::Any;
use std::fmt;

type Cleanup = Box<dyn FnOnce(Box<dyn Any + Send>) + Send>;

/// Holds at most one value. The cleanup hook runs exactly once, when the value
/// is removed, replaced or the slot is cleared.
#[derive(Default)]
pub struct ClientData {
    value: Option<Box<dyn Any + Send>>,
    cleanup: Option<Cleanup>,
}

impl ClientData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data`, running the cleanup of whatever was stored before.
    pub fn set<T, F>(&mut self, data: T, cleanup: Option<F>)
    where
        T: Any + Send,
        F: FnOnce(T) + Send + 'static,
    {
        self.clear();
        self.value = Some(Box::new(data));
        self.cleanup = cleanup.map(|f| -> Cleanup {
            Box::new(move |boxed: Box<dyn Any + Send>| {
                if let Ok(value) = boxed.downcast::<T>() {
                    f(*value);
                }
            })
        });
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.as_deref_mut().and_then(|v| v.downcast_mut::<T>())
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Drop the stored value, running its cleanup hook. No-op when empty.
    pub fn clear(&mut self) {
        let cleanup = self.cleanup.take();
        if let Some(value) = self.value.take() {
            if let Some(cleanup) = cleanup {
                cleanup(value);
            }
        }
    }
}

impl fmt::Debug for ClientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientData")
            .field("set", &self.value.is_some())
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}
