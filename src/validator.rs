use std::sync::Mutex;

/// Remembers the validator (`ETag`) of the last successful fetch so the next fetch can be
/// conditional.
#[derive(Debug, Default)]
pub struct ValidatorCache {
    token: Mutex<Option<String>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        ValidatorCache::default()
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .lock()
            .expect("thread holding validator lock should not panic")
            .clone()
    }

    /// Record the validator from a 200 response. A response without a validator keeps the
    /// previous token.
    pub fn update(&self, response_validator: Option<String>) {
        if let Some(token) = response_validator {
            *self
                .token
                .lock()
                .expect("thread holding validator lock should not panic") = Some(token);
        }
    }
}
