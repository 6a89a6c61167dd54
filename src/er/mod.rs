//! Entity-relationship model supplied by the caller.
//!
//! The model is request-scoped: it is deserialized from the request body,
//! handed to the SQL synthesizer and dropped with the response. Names are
//! free text and nothing here validates that relationship endpoints refer to
//! entities that exist.

use serde::{Deserialize, Serialize};

use crate::util::text::{mentions, mentions_word, singularize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::OneToOne => "one-to-one",
            RelationshipKind::OneToMany => "one-to-many",
            RelationshipKind::ManyToMany => "many-to-many",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErModel {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Entity {
    pub fn new<N, A>(name: N, attributes: A) -> Self
    where
        N: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            name: name.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Lower-cased singular form of the entity name ("Users" -> "user").
    pub fn singular(&self) -> String {
        singularize(&self.name)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Whether a lower-cased description refers to this entity by its name
    /// or its singular form, as a whole word.
    pub fn is_mentioned_in(&self, lowered: &str) -> bool {
        let name = self.name.to_ascii_lowercase();
        !name.is_empty() && (mentions_word(lowered, &name) || mentions_word(lowered, &self.singular()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// First attribute whose lower-cased name contains any of `hints`.
    pub fn attribute_like(&self, hints: &[&str]) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| {
                let lower = attr.to_ascii_lowercase();
                hints.iter().any(|hint| lower.contains(hint))
            })
            .map(String::as_str)
    }

    /// First attribute named in a lower-cased description. Underscores in
    /// attribute names also match spaces ("order_date" ~ "order date").
    pub fn attribute_mentioned_in(&self, lowered: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| {
                let lower = attr.to_ascii_lowercase();
                mentions(lowered, &lower) || mentions(lowered, &lower.replace('_', " "))
            })
            .map(String::as_str)
    }

    /// Best guess at the primary key column.
    pub fn primary_key(&self) -> String {
        if let Some(id) = self.attribute("id") {
            return id.to_string();
        }
        if let Some(id) = self.attribute(&format!("{}_id", self.singular())) {
            return id.to_string();
        }
        "id".to_string()
    }

    /// Column in this entity that points at `parent`, if one is recognisable.
    pub fn reference_to(&self, parent: &Entity) -> Option<&str> {
        let parent_singular = parent.singular();
        let own_key = self.primary_key();
        self.attributes
            .iter()
            .filter(|attr| !attr.eq_ignore_ascii_case(&own_key))
            .find(|attr| {
                let lower = attr.to_ascii_lowercase();
                lower.contains(&parent_singular) && lower.ends_with("id")
            })
            .map(String::as_str)
    }

    /// Foreign key column pointing at `parent`, falling back to the
    /// `<parent>_id` naming convention.
    pub fn foreign_key_to(&self, parent: &Entity) -> String {
        self.reference_to(parent)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", parent.singular()))
    }
}

impl Relationship {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: RelationshipKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
        }
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from.eq_ignore_ascii_case(a) && self.to.eq_ignore_ascii_case(b))
            || (self.from.eq_ignore_ascii_case(b) && self.to.eq_ignore_ascii_case(a))
    }
}

impl ErModel {
    pub fn new(entities: Vec<Entity>, relationships: Vec<Relationship>) -> Self {
        Self {
            entities,
            relationships,
        }
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.is_named(name))
    }

    pub fn relationships_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.relationships
            .iter()
            .filter(move |rel| rel.from.eq_ignore_ascii_case(name))
    }

    /// Relationship joining the two entities, in either direction.
    pub fn relationship_between(&self, a: &str, b: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|rel| rel.connects(a, b))
    }

    /// Entities referred to by a lower-cased description, in model order.
    pub fn mentioned_in(&self, lowered: &str) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|entity| entity.is_mentioned_in(lowered))
            .collect()
    }
}
