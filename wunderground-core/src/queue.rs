/// Ordered, duplicate-free list of pending feature tokens.
///
/// Tokens accumulate across builder calls and are taken all at once by the
/// next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureQueue {
    tokens: Vec<String>,
}

impl FeatureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `token` unless it is already queued. Returns the queue for chaining.
    pub fn enqueue(&mut self, token: impl Into<String>) -> &mut Self {
        let token = token.into();
        if !self.tokens.contains(&token) {
            self.tokens.push(token);
        }
        self
    }

    /// Take the current contents in order, leaving the queue empty.
    pub fn drain_all(&mut self) -> Vec<String> {
        std::mem::take(&mut self.tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
