//! Topic catalog
//!
//! Static mapping of topic id to its ordered questions and candidate
//! scripture verses. Loaded once at startup and never mutated.

use rust_embed::Embed;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Embed)]
#[folder = "data/"]
struct BundledData;

const BUNDLED_CATALOG: &str = "topics.json";

/// Category id used when a document lists topics without grouping
const UNGROUPED_CATEGORY: &str = "all";

/// Errors raised while loading or querying the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid catalog: {0}")]
    Invalid(String),
    #[error("Topic not found: {0}")]
    TopicNotFound(String),
}

/// A scripture passage a session can close with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptureReference {
    pub book: String,
    pub chapter: u32,
    /// Verse label, may be a range such as "22-23"
    pub verse: String,
    pub text: String,
}

impl ScriptureReference {
    /// Citation in "Book chapter:verse" form
    pub fn citation(&self) -> String {
        format!("{} {}:{}", self.book, self.chapter, self.verse)
    }
}

/// A study topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<String>,
    pub bible_references: Vec<ScriptureReference>,
}

impl Topic {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, index: usize) -> Option<&str> {
        self.questions.get(index).map(String::as_str)
    }
}

/// A named group of topics, in document order
#[derive(Debug, Clone)]
pub struct Category {
    pub id: String,
    pub title: String,
    pub description: String,
    pub topic_ids: Vec<String>,
}

// Wire shapes of the catalog document

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    categories: Vec<CategoryDocument>,
    #[serde(default)]
    topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
struct CategoryDocument {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    topics: Vec<Topic>,
}

/// Read-only topic lookup
#[derive(Debug)]
pub struct TopicCatalog {
    categories: Vec<Category>,
    topics: HashMap<String, Arc<Topic>>,
}

impl TopicCatalog {
    /// Parse a catalog document.
    ///
    /// Accepts either `{"categories": [...]}` or a flat `{"topics": [...]}`;
    /// a flat list is placed in a single category.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;

        let mut groups: Vec<(Category, Vec<Topic>)> = doc
            .categories
            .into_iter()
            .map(|c| {
                (
                    Category {
                        id: c.id,
                        title: c.title,
                        description: c.description,
                        topic_ids: Vec::new(),
                    },
                    c.topics,
                )
            })
            .collect();

        if !doc.topics.is_empty() {
            groups.push((
                Category {
                    id: UNGROUPED_CATEGORY.to_string(),
                    title: "All topics".to_string(),
                    description: String::new(),
                    topic_ids: Vec::new(),
                },
                doc.topics,
            ));
        }

        let mut categories = Vec::with_capacity(groups.len());
        let mut topics = HashMap::new();

        for (mut category, members) in groups {
            for topic in members {
                validate_topic(&topic)?;
                if topics.contains_key(&topic.id) {
                    return Err(CatalogError::Invalid(format!(
                        "duplicate topic id '{}'",
                        topic.id
                    )));
                }
                category.topic_ids.push(topic.id.clone());
                topics.insert(topic.id.clone(), Arc::new(topic));
            }
            categories.push(category);
        }

        if topics.is_empty() {
            return Err(CatalogError::Invalid("catalog has no topics".to_string()));
        }

        Ok(Self { categories, topics })
    }

    /// Load a catalog document from disk
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The catalog shipped inside the binary
    pub fn bundled() -> Result<Self, CatalogError> {
        let file = BundledData::get(BUNDLED_CATALOG).ok_or_else(|| {
            CatalogError::Invalid(format!("bundled {BUNDLED_CATALOG} is missing"))
        })?;
        let json = std::str::from_utf8(&file.data)
            .map_err(|e| CatalogError::Invalid(format!("bundled catalog is not UTF-8: {e}")))?;
        Self::from_json(json)
    }

    pub fn find_topic(&self, id: &str) -> Result<Arc<Topic>, CatalogError> {
        self.topics
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::TopicNotFound(id.to_string()))
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Topics of a category in document order
    pub fn topics_in<'a>(&'a self, category: &'a Category) -> impl Iterator<Item = &'a Topic> {
        category
            .topic_ids
            .iter()
            .filter_map(|id| self.topics.get(id).map(|topic| &**topic))
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

fn validate_topic(topic: &Topic) -> Result<(), CatalogError> {
    if topic.id.trim().is_empty() {
        return Err(CatalogError::Invalid("topic with empty id".to_string()));
    }
    if topic.questions.is_empty() {
        return Err(CatalogError::Invalid(format!(
            "topic '{}' has no questions",
            topic.id
        )));
    }
    if topic.bible_references.is_empty() {
        return Err(CatalogError::Invalid(format!(
            "topic '{}' has no bible references",
            topic.id
        )));
    }
    Ok(())
}
