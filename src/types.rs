use std::fmt;

/// A unique identifier for a connected user.
///
/// Wrapping `u64` in a newtype prevents accidentally passing a raw
/// integer where a user ID is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw number, as shown to clients (`user:7> ...`).
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}
