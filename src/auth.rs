/// Supplies the bearer token for chat and thread requests.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A token fixed at startup, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}
