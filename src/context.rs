use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::store::{ContextStore, ScreenBlob, names};

/// A screen blob carried whole inside the composite context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Subjective,
    Perspectives,
    Assessments,
}

impl Section {
    /// Key under which the blob appears in the composite context.
    pub fn key(self) -> &'static str {
        match self {
            Section::Subjective => "subjective",
            Section::Perspectives => "perspectives",
            Section::Assessments => "assessments",
        }
    }

    /// Blob the section is read from.
    pub fn blob(self) -> &'static str {
        match self {
            Section::Subjective => names::SUBJECTIVE,
            Section::Perspectives => names::PERSPECTIVES,
            Section::Assessments => names::ASSESSMENTS,
        }
    }
}

/// Merged view of earlier screens, sent as `previous` with every request.
///
/// Serializes flat: the three intake scalars followed by one key per
/// section.  Built fresh for each request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeContext {
    pub age_sex: String,
    pub present_history: String,
    pub past_history: String,
    #[serde(flatten)]
    pub sections: BTreeMap<&'static str, ScreenBlob>,
}

impl CompositeContext {
    pub fn section(&self, section: Section) -> Option<&ScreenBlob> {
        self.sections.get(section.key())
    }

    /// String value of `field` inside a section, if present.
    pub fn section_str(&self, section: Section, field: &str) -> Option<&str> {
        self.section(section)?.get(field)?.as_str()
    }

    pub fn to_value(&self) -> Value {
        // Only string and map fields: serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Assemble the composite context from the current store contents.
///
/// Missing or malformed blobs become `{}`, missing or non-string intake
/// scalars become `""`.  Reads only; calling twice without writes in
/// between gives equal results.
pub async fn build(store: &dyn ContextStore, sections: &[Section]) -> Result<CompositeContext> {
    let intake = store.get(names::INTAKE).await?;
    let scalar = |key: &str| -> String {
        intake
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let mut ctx = CompositeContext {
        age_sex: scalar("age_sex"),
        present_history: scalar("present_history"),
        past_history: scalar("past_history"),
        sections: BTreeMap::new(),
    };

    for section in sections {
        let blob = store.get(section.blob()).await?;
        ctx.sections.insert(section.key(), blob);
    }

    Ok(ctx)
}
