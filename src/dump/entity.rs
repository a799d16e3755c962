use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

/// Entity kinds found in the full dump. Lexemes and media info show up in some
/// exports and are never matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Item,
    Property,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MonolingualText {
    #[serde(default)]
    pub language: String,
    pub value: String,
}

/// One record of the Wikidata JSON dump, reduced to the localized terms.
/// Claims and sitelinks are skipped during deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct DumpEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub labels: HashMap<String, MonolingualText>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub descriptions: HashMap<String, MonolingualText>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub aliases: HashMap<String, Vec<MonolingualText>>,
}

impl DumpEntity {
    pub fn from_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).with_context(|| {
            let preview: String = line.chars().take(80).collect();
            format!("malformed dump record: {preview}")
        })
    }

    /// Numeric part of an item QID (`Q42` -> 42). `None` for properties and
    /// other entity kinds.
    pub fn item_id(&self) -> Option<i64> {
        if self.kind != EntityKind::Item {
            return None;
        }
        self.id.strip_prefix('Q')?.parse().ok()
    }

    pub fn label(&self, lang: &str) -> Option<&str> {
        self.labels.get(lang).map(|t| t.value.as_str())
    }

    pub fn description(&self, lang: &str) -> Option<&str> {
        self.descriptions.get(lang).map(|t| t.value.as_str())
    }

    /// Aliases in dump order; empty when the language has none.
    pub fn aliases(&self, lang: &str) -> Vec<&str> {
        self.aliases
            .get(lang)
            .map(|list| list.iter().map(|t| t.value.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Term maps serialize as `[]` instead of `{}` when empty.
fn map_or_empty_list<'de, D, V>(deserializer: D) -> Result<HashMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList<V> {
        Map(HashMap<String, V>),
        List(Vec<serde::de::IgnoredAny>),
    }

    match MapOrList::<V>::deserialize(deserializer)? {
        MapOrList::Map(map) => Ok(map),
        MapOrList::List(_) => Ok(HashMap::new()),
    }
}
