//! Title-based topic tagging against a fixed keyword taxonomy.

use crate::video::VideoRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicCategory {
    pub category: String,
    pub keywords: Vec<String>,
}

impl TopicCategory {
    pub fn new<I, S>(category: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category: category.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// `title_lower` must already be lower-cased.
    pub fn matches(&self, title_lower: &str) -> bool {
        self.keywords.iter().any(|k| title_lower.contains(k.as_str()))
    }
}

/// Ordered category → keyword mapping. Keywords are stored trimmed and lower-cased.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<TopicCategory>", into = "Vec<TopicCategory>")]
pub struct TopicTaxonomy {
    categories: Vec<TopicCategory>,
}

impl TopicTaxonomy {
    pub fn new(categories: Vec<TopicCategory>) -> Result<Self> {
        let mut names = BTreeSet::new();
        let mut out = Vec::with_capacity(categories.len());
        for c in categories {
            let name = c.category.trim().to_string();
            if name.is_empty() {
                return Err(Error::InvalidTaxonomy("empty category name".to_string()));
            }
            if !names.insert(name.clone()) {
                return Err(Error::InvalidTaxonomy(format!("duplicate category {name:?}")));
            }
            let mut keywords = Vec::with_capacity(c.keywords.len());
            for k in c.keywords {
                let k = k.trim().to_lowercase();
                if k.is_empty() {
                    return Err(Error::InvalidTaxonomy(format!(
                        "category {name:?} has an empty keyword"
                    )));
                }
                if !keywords.contains(&k) {
                    keywords.push(k);
                }
            }
            if keywords.is_empty() {
                return Err(Error::InvalidTaxonomy(format!(
                    "category {name:?} has no keywords"
                )));
            }
            out.push(TopicCategory {
                category: name,
                keywords,
            });
        }
        Ok(Self { categories: out })
    }

    /// `[{"category": "...", "keywords": ["..."]}, ...]`
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::InvalidTaxonomy(e.to_string()))
    }

    pub fn categories(&self) -> &[TopicCategory] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for TopicTaxonomy {
    fn default() -> Self {
        let categories = vec![
            TopicCategory::new("Marketing", ["marketing", "brand", "ads"]),
            TopicCategory::new("Sales", ["sales", "pitch", "close"]),
            TopicCategory::new(
                "Entrepreneurship / Business",
                ["business", "startup", "entrepreneur"],
            ),
            TopicCategory::new("AI", ["ai", "chatgpt", "machine learning"]),
            TopicCategory::new(
                "Skill Development",
                ["skills", "learning", "habits", "productivity"],
            ),
            TopicCategory::new("Web Dev", ["html", "css", "javascript", "developer"]),
            TopicCategory::new("Customer Success", ["customer", "support"]),
            TopicCategory::new("Tech", ["tech", "software", "tools"]),
        ];
        Self { categories }
    }
}

impl TryFrom<Vec<TopicCategory>> for TopicTaxonomy {
    type Error = Error;

    fn try_from(v: Vec<TopicCategory>) -> Result<Self> {
        Self::new(v)
    }
}

impl From<TopicTaxonomy> for Vec<TopicCategory> {
    fn from(t: TopicTaxonomy) -> Self {
        t.categories
    }
}

/// How many categories one video may count toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Only the first matching category, in taxonomy order.
    #[default]
    FirstMatch,
    /// Every matching category.
    AllMatches,
}

impl MatchPolicy {
    pub fn name(self) -> &'static str {
        match self {
            MatchPolicy::FirstMatch => "first-match",
            MatchPolicy::AllMatches => "all-matches",
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-match" | "first" => Ok(MatchPolicy::FirstMatch),
            "all-matches" | "all" => Ok(MatchPolicy::AllMatches),
            other => Err(Error::InvalidTaxonomy(format!(
                "unknown match policy: {other} (allowed: first-match, all-matches)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    /// Never empty; ranked by count desc, then name asc.
    Matched { topics: Vec<TopicCount> },
    NoFit,
}

impl Classification {
    pub fn is_no_fit(&self) -> bool {
        matches!(self, Classification::NoFit)
    }

    pub fn topics(&self) -> &[TopicCount] {
        match self {
            Classification::Matched { topics } => topics,
            Classification::NoFit => &[],
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::NoFit => f.write_str("N/A"),
            Classification::Matched { topics } => {
                let names: Vec<&str> = topics.iter().map(|t| t.category.as_str()).collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

/// Categories `title` falls under, in taxonomy order, honoring `policy`.
pub fn matching_categories<'t>(
    title: &str,
    taxonomy: &'t TopicTaxonomy,
    policy: MatchPolicy,
) -> Vec<&'t str> {
    let title = title.to_lowercase();
    let mut out = Vec::new();
    for c in taxonomy.categories() {
        if c.matches(&title) {
            out.push(c.category.as_str());
            if policy == MatchPolicy::FirstMatch {
                break;
            }
        }
    }
    out
}

pub fn classify(
    records: &[VideoRecord],
    taxonomy: &TopicTaxonomy,
    policy: MatchPolicy,
) -> Classification {
    let mut counts = vec![0usize; taxonomy.len()];
    for r in records {
        let title = r.title.to_lowercase();
        for (i, c) in taxonomy.categories().iter().enumerate() {
            if c.matches(&title) {
                counts[i] += 1;
                if policy == MatchPolicy::FirstMatch {
                    break;
                }
            }
        }
    }

    let mut topics: Vec<TopicCount> = taxonomy
        .categories()
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|(c, count)| TopicCount {
            category: c.category.clone(),
            count,
        })
        .collect();
    if topics.is_empty() {
        return Classification::NoFit;
    }
    topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    Classification::Matched { topics }
}
