use chrono::{DateTime, Utc};

/// Marker stored when no field value could be recovered.
pub const NOT_FOUND: &str = "not found";

/// An entity to look up, keyed by its full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub name: String,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn key(&self) -> &str {
        &self.name
    }

    /// Whitespace-separated name tokens, empties dropped.
    pub fn tokens(&self) -> Vec<&str> {
        self.name.split_whitespace().collect()
    }
}

/// Specificity of a search term, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    FullName,
    FirstTwo,
    FirstToken,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::FullName => "full-name",
            Tier::FirstTwo => "first-two",
            Tier::FirstToken => "first-token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub text: String,
    pub tier: Tier,
}

/// One entry of a result list, addressed by locator and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub display_name: String,
    pub locator: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub target_key: String,
    pub field_value: String,
    pub resolved_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn new(target_key: impl Into<String>, field_value: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
            field_value: field_value.into(),
            resolved_at: Utc::now(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.field_value != NOT_FOUND
    }
}
