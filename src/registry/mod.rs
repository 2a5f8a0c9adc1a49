use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Length of a job token in hex characters
pub const TOKEN_LEN: usize = 6;

/// Generate a short opaque token for a job
pub fn generate_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

/// Maps job tokens to the cancellation handle of the in-flight job.
///
/// Command handlers and the worker run on different tasks, so the map is
/// behind a mutex. Critical sections never await.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Associate `token` with `handle`. Returns `None` if the token is taken.
    pub fn register(&self, token: &str, handle: CancellationToken) -> Option<TaskRegistration> {
        let mut tasks = self.tasks();
        if tasks.contains_key(token) {
            return None;
        }
        tasks.insert(token.to_string(), handle.clone());
        debug!("Registered task {}", token);

        Some(TaskRegistration {
            token: token.to_string(),
            handle,
            registry: self.clone(),
        })
    }

    /// Register a fresh cancellation handle under a newly generated token
    pub fn register_new(&self) -> TaskRegistration {
        loop {
            if let Some(registration) = self.register(&generate_token(), CancellationToken::new())
            {
                return registration;
            }
        }
    }

    /// Signal cancellation to the job registered under `token`.
    ///
    /// Returns `false` when no such job is in flight. The job stops at its
    /// next cancellation point.
    pub fn cancel(&self, token: &str) -> bool {
        match self.tasks().get(token) {
            Some(handle) => {
                handle.cancel();
                debug!("Cancellation requested for task {}", token);
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `token`. Returns whether it was present.
    pub fn unregister(&self, token: &str) -> bool {
        let removed = self.tasks().remove(token).is_some();
        if removed {
            debug!("Unregistered task {}", token);
        }
        removed
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tasks().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A live registry entry. Dropping it unregisters the token, so every exit
/// path of a job, including panics and early returns, removes its entry.
#[derive(Debug)]
pub struct TaskRegistration {
    token: String,
    handle: CancellationToken,
    registry: TaskRegistry,
}

impl TaskRegistration {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.handle
    }
}

impl Drop for TaskRegistration {
    fn drop(&mut self) {
        self.registry.unregister(&self.token);
    }
}
