use crate::er::ErModel;

pub const SYSTEM_PROMPT: &str =
    "You are a SQL expert. Generate only valid SQL queries without explanations.";

/// `- Users: id, name, email` lines, one per entity.
pub fn describe_entities(model: &ErModel) -> String {
    model
        .entities
        .iter()
        .map(|entity| format!("- {}: {}", entity.name, entity.attributes.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `- Users -> Orders (one-to-many)` lines, one per relationship.
pub fn describe_relationships(model: &ErModel) -> String {
    model
        .relationships
        .iter()
        .map(|rel| format!("- {} -> {} ({})", rel.from, rel.to, rel.kind.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn prepare_prompt(model: &ErModel, description: &str) -> String {
    format!(
        r#"
You are a SQL expert. Given the following ER diagram structure and query description, generate a valid SQL query.

ER Diagram Structure:
Entities:
{}

Relationships:
{}

Query Description: {}

Generate a SQL query that answers this description. Return only the SQL query without any explanations or markdown formatting.
"#,
        describe_entities(model),
        describe_relationships(model),
        description
    )
}
