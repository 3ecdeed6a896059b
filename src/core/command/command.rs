use super::ExecutionContext;
use crate::base::{CommandKey, ExecutionError};
use std::fmt;

/// The unit of work wrapped by a command, typically a call to a remote dependency.
pub type Work<T> = Box<dyn FnOnce(&ExecutionContext) -> crate::Result<T> + Send + 'static>;

/// The alternative path, given the error of the primary attempt.
pub type Fallback<T> = Box<dyn FnOnce(&ExecutionError) -> crate::Result<T> + Send + 'static>;

/// `Command` pairs the `work` of one execution with its optional `fallback`.
/// A command is consumed by the executor, build a new one for every execution.
pub struct Command<T> {
    key: CommandKey,
    work: Work<T>,
    fallback: Option<Fallback<T>>,
}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("key", &self.key)
            .field("has_fallback", &self.has_fallback())
            .finish()
    }
}

impl<T: Send + 'static> Command<T> {
    pub fn new<W>(key: CommandKey, work: W) -> Self
    where
        W: FnOnce(&ExecutionContext) -> crate::Result<T> + Send + 'static,
    {
        Command {
            key,
            work: Box::new(work),
            fallback: None,
        }
    }

    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: FnOnce(&ExecutionError) -> crate::Result<T> + Send + 'static,
    {
        self.fallback = Some(Box::new(fallback));
        self
    }
}

impl<T> Command<T> {
    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub(crate) fn into_parts(self) -> (CommandKey, Work<T>, Option<Fallback<T>>) {
        (self.key, self.work, self.fallback)
    }
}
