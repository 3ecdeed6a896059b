use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// `CommandKey` identifies a group of executions sharing one circuit breaker and one bulkhead,
/// usually the logical name of the remote dependency.
/// Keys are immutable and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandKey(Arc<str>);

impl CommandKey {
    pub fn new(name: &str) -> Self {
        CommandKey(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandKey {
    fn from(name: &str) -> Self {
        CommandKey::new(name)
    }
}

impl From<String> for CommandKey {
    fn from(name: String) -> Self {
        CommandKey(Arc::from(name))
    }
}

impl Borrow<str> for CommandKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
