use serde::{Deserialize, Serialize};

/// A piece of content: title and body, with no identity of its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Content {
    pub title: String,
    pub body: String,
}

impl Content {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}
