//! Keyword-driven SQL generation used when no provider is configured, or
//! when the provider call fails.
//!
//! The rules live in an ordered table ([`MockRule::ORDERED`]). Each rule has
//! a keyword predicate and a builder; the first rule whose predicate matches
//! and whose builder can produce SQL from the model wins. A builder declines
//! (returns `None`) when the model lacks what it needs, e.g. a numeric column
//! for a comparison, and dispatch moves on to the next rule.
//!
//! Names from the model are inserted verbatim. Literal values are quoted.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::er::{Entity, ErModel, Relationship, RelationshipKind};
use crate::util::text::{find_mention, mentions, singularize, sql_literal};

/// Returned when the model has no entities at all.
pub const GENERIC_SQL: &str = "SELECT * FROM table_name;";

const COUNT_KEYWORDS: &[&str] = &["count", "how many", "number of"];
const JOIN_KEYWORDS: &[&str] = &["join"];
const AGGREGATE_KEYWORDS: &[&str] = &["sum", "total", "average", "avg", "mean", "revenue"];
const AVERAGE_KEYWORDS: &[&str] = &["average", "avg", "mean"];
const RECENT_KEYWORDS: &[&str] = &["recent", "recently", "latest", "newest"];
const SEARCH_KEYWORDS: &[&str] = &["search", "containing", "contains", "named", "matching"];

// Longer phrases first so "greater than or equal to" beats "greater than"
const COMPARISONS: &[(&str, &str)] = &[
    ("greater than or equal to", ">="),
    ("less than or equal to", "<="),
    ("at least", ">="),
    ("at most", "<="),
    ("greater than", ">"),
    ("more than", ">"),
    ("higher than", ">"),
    ("larger than", ">"),
    ("above", ">"),
    ("exceeding", ">"),
    ("less than", "<"),
    ("fewer than", "<"),
    ("lower than", "<"),
    ("smaller than", "<"),
    ("below", "<"),
    (">=", ">="),
    ("<=", "<="),
    (">", ">"),
    ("<", "<"),
];

const NUMERIC_HINTS: &[&str] = &[
    "price", "total", "amount", "cost", "quantity", "qty", "salary", "balance", "credit",
    "score", "rating", "stock", "weight",
];
// Matched as whole underscore-separated parts only ("age" but not "page")
const NUMERIC_WORDS: &[&str] = &["age"];
const DATE_HINTS: &[&str] = &["date", "created", "updated", "time", "_at"];
const TEXT_HINTS: &[&str] = &["name", "title", "description", "email"];

const STATUS_WORDS: &[&str] = &[
    "pending", "active", "inactive", "shipped", "delivered", "completed", "cancelled",
    "canceled", "paid", "unpaid", "processing", "draft", "published", "failed",
];
const STOP_WORDS: &[&str] = &[
    "of", "for", "in", "on", "by", "and", "or", "the", "a", "an", "with", "from", "to", "is",
    "are",
];

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("number pattern"));
static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^A-Za-z0-9_])(?:'([^']+)'|"([^"]+)")"#).expect("quoted value pattern")
});
static STATUS_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bstatus(?:es)?\s+(?:is\s+|=\s*|:\s*)?([a-z0-9_-]+)").expect("status pattern")
});
static GROUP_BY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:by|per|for each)\s+([a-z0-9_]+)").expect("group pattern")
});
static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:last|past)\s+(?:(\d+)\s+)?(day|week|month|year)s?\b").expect("period pattern")
});
static SEARCH_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:search(?:ing)?(?:\s+for)?|containing|contains|named|matching)\s+([A-Za-z0-9_@.%-]+)")
        .expect("search term pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRule {
    Count,
    Comparison,
    Equality,
    Aggregate,
    Recent,
    Join,
    Search,
    Default,
}

impl MockRule {
    /// Dispatch order; the first rule that produces SQL wins.
    pub const ORDERED: [MockRule; 8] = [
        MockRule::Count,
        MockRule::Comparison,
        MockRule::Equality,
        MockRule::Aggregate,
        MockRule::Recent,
        MockRule::Join,
        MockRule::Search,
        MockRule::Default,
    ];

    fn matches(self, q: &Query<'_>) -> bool {
        match self {
            MockRule::Count => q.has_any(COUNT_KEYWORDS),
            MockRule::Comparison => q.comparison().is_some(),
            MockRule::Equality => {
                q.has("status") || q.quoted().is_some() || q.status_word().is_some()
            }
            MockRule::Aggregate => q.has_any(AGGREGATE_KEYWORDS),
            MockRule::Recent => q.has_any(RECENT_KEYWORDS) || PERIOD.is_match(&q.lowered),
            MockRule::Join => q.has_any(JOIN_KEYWORDS) || q.mentioned.len() >= 2,
            MockRule::Search => q.has_any(SEARCH_KEYWORDS),
            MockRule::Default => true,
        }
    }

    fn build(self, q: &Query<'_>) -> Option<String> {
        match self {
            MockRule::Count => build_count(q),
            MockRule::Comparison => build_comparison(q),
            MockRule::Equality => build_equality(q),
            MockRule::Aggregate => build_aggregate(q),
            MockRule::Recent => build_recent(q),
            MockRule::Join => build_join(q),
            MockRule::Search => build_search(q),
            MockRule::Default => build_default(q),
        }
    }

    fn apply(self, q: &Query<'_>) -> Option<String> {
        if self.matches(q) { self.build(q) } else { None }
    }
}

/// Generates SQL for `description` from keyword heuristics alone.
pub fn generate_mock_sql(model: &ErModel, description: &str) -> String {
    match select_rule(model, description) {
        Some((rule, sql)) => {
            debug!(?rule, "Mock rule matched");
            sql
        }
        None => GENERIC_SQL.to_string(),
    }
}

/// The winning rule and its SQL, or `None` when the model has no entities.
pub fn select_rule(model: &ErModel, description: &str) -> Option<(MockRule, String)> {
    let query = Query::new(model, description);
    MockRule::ORDERED
        .iter()
        .find_map(|rule| rule.apply(&query).map(|sql| (*rule, sql)))
}

struct Query<'a> {
    model: &'a ErModel,
    raw: &'a str,
    // ASCII lower-casing keeps byte offsets aligned with `raw`
    lowered: String,
    mentioned: Vec<&'a Entity>,
}

impl<'a> Query<'a> {
    fn new(model: &'a ErModel, raw: &'a str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        let mentioned = model.mentioned_in(&lowered);
        Self {
            model,
            raw,
            lowered,
            mentioned,
        }
    }

    fn has(&self, keyword: &str) -> bool {
        mentions(&self.lowered, keyword)
    }

    fn has_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|keyword| self.has(keyword))
    }

    /// First mentioned entity, else the first entity of the model.
    fn target(&self) -> Option<&'a Entity> {
        self.mentioned
            .first()
            .copied()
            .or_else(|| self.model.entities.first())
    }

    /// Mentioned entities, then the remaining ones in model order.
    fn candidates(&self) -> impl Iterator<Item = &'a Entity> + '_ {
        let rest = self
            .model
            .entities
            .iter()
            .filter(|entity| !self.mentioned.iter().any(|m| std::ptr::eq(*m, *entity)));
        self.mentioned.iter().copied().chain(rest)
    }

    /// Operator and the offset just past the comparison phrase.
    fn comparison(&self) -> Option<(&'static str, usize, usize)> {
        COMPARISONS.iter().find_map(|(phrase, op)| {
            find_mention(&self.lowered, phrase).map(|at| (*op, at, at + phrase.len()))
        })
    }

    fn quoted(&self) -> Option<&'a str> {
        QUOTED
            .captures(self.raw)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
    }

    fn status_word(&self) -> Option<&'static str> {
        STATUS_WORDS.iter().copied().find(|word| self.has(word))
    }

    /// Value following "status", e.g. "status shipped" or "status is open".
    fn status_value(&self) -> Option<String> {
        if let Some(word) = self.status_word() {
            return Some(word.to_string());
        }

        let caps = STATUS_VALUE.captures(&self.lowered)?;
        let value = caps.get(1)?;
        let word = value.as_str();
        let names_entity = self.model.entities.iter().any(|e| e.is_mentioned_in(word));
        if STOP_WORDS.contains(&word) || names_entity {
            return None;
        }
        Some(self.raw[value.start()..value.end()].to_string())
    }
}

fn statement(lines: Vec<String>) -> String {
    let mut sql = lines.join("\n");
    sql.push(';');
    sql
}

fn is_identifier(attribute: &str) -> bool {
    let lower = attribute.to_ascii_lowercase();
    lower == "id" || lower.ends_with("_id")
}

fn attribute_offset(lowered: &str, attribute: &str) -> Option<usize> {
    let lower = attribute.to_ascii_lowercase();
    find_mention(lowered, &lower).or_else(|| find_mention(lowered, &lower.replace('_', " ")))
}

fn is_numeric_attribute(attribute: &str) -> bool {
    let lower = attribute.to_ascii_lowercase();
    NUMERIC_HINTS.iter().any(|hint| lower.contains(hint))
        || lower.split('_').any(|part| NUMERIC_WORDS.contains(&part))
}

fn numeric_attribute(entity: &Entity) -> Option<&str> {
    entity
        .attributes
        .iter()
        .map(String::as_str)
        .find(|attr| is_numeric_attribute(attr))
}

fn first_number(text: &str) -> Option<String> {
    NUMBER.find(text).map(|m| m.as_str().replace(',', ""))
}

/// A numeric-looking column, preferring one named in the description.
fn numeric_column<'a>(q: &Query<'a>) -> Option<(&'a Entity, &'a str)> {
    let named = q.candidates().find_map(|entity| {
        entity
            .attributes
            .iter()
            .filter(|attr| attribute_offset(&q.lowered, attr).is_some())
            .find(|attr| is_numeric_attribute(attr))
            .map(|attr| (entity, attr.as_str()))
    });

    named.or_else(|| {
        q.candidates()
            .find_map(|entity| numeric_attribute(entity).map(|attr| (entity, attr)))
    })
}

/// Parent entity and the relationship to count through.
///
/// A mentioned entity with an outgoing relationship groups directly. A
/// mentioned child ("count orders") groups under its parent. Entities the
/// description never names are only considered when nothing is mentioned.
fn count_relationship<'a>(q: &Query<'a>) -> Option<(&'a Entity, &'a Relationship)> {
    let outgoing = |entity: &'a Entity| {
        q.model
            .relationships_from(&entity.name)
            .next()
            .map(|rel| (entity, rel))
    };

    if q.mentioned.is_empty() {
        return q.model.entities.iter().find_map(outgoing);
    }

    q.mentioned.iter().copied().find_map(outgoing).or_else(|| {
        q.mentioned.iter().find_map(|child| {
            q.model
                .relationships
                .iter()
                .filter(|rel| child.is_named(&rel.to))
                .find_map(|rel| q.model.entity(&rel.from).map(|parent| (parent, rel)))
        })
    })
}

fn build_count(q: &Query<'_>) -> Option<String> {
    let Some((entity, rel)) = count_relationship(q) else {
        let entity = q.target()?;
        return Some(statement(vec![
            "SELECT COUNT(*) AS total_count".to_string(),
            format!("FROM {}", entity.name),
        ]));
    };

    let related = q
        .model
        .entity(&rel.to)
        .cloned()
        .unwrap_or_else(|| Entity::new(rel.to.clone(), Vec::<String>::new()));
    let pk = entity.primary_key();

    Some(statement(vec![
        format!(
            "SELECT {}.*, COUNT({}.{}) AS {}_count",
            entity.name,
            related.name,
            related.primary_key(),
            related.name.to_ascii_lowercase()
        ),
        format!("FROM {}", entity.name),
        format!(
            "LEFT JOIN {} ON {}.{} = {}.{}",
            related.name,
            related.name,
            related.foreign_key_to(entity),
            entity.name,
            pk
        ),
        format!("GROUP BY {}.{}", entity.name, pk),
    ]))
}

fn build_comparison(q: &Query<'_>) -> Option<String> {
    let (op, phrase_at, phrase_end) = q.comparison()?;
    let value = first_number(&q.raw[phrase_end..]).or_else(|| first_number(q.raw))?;

    // The column named closest before the phrase, e.g. "age greater than 30"
    let named = q
        .candidates()
        .flat_map(|entity| entity.attributes.iter().map(move |attr| (entity, attr.as_str())))
        .filter(|(_, attr)| !is_identifier(attr))
        .filter_map(|(entity, attr)| {
            attribute_offset(&q.lowered, attr)
                .filter(|&at| at < phrase_at)
                .map(|at| (phrase_at - at, entity, attr))
        })
        .min_by_key(|(distance, _, _)| *distance)
        .map(|(_, entity, attr)| (entity, attr));

    let (entity, column) = named.or_else(|| numeric_column(q))?;
    let direction = if op.starts_with('>') { "DESC" } else { "ASC" };

    Some(statement(vec![
        "SELECT *".to_string(),
        format!("FROM {}", entity.name),
        format!("WHERE {} {} {}", column, op, value),
        format!("ORDER BY {} {}", column, direction),
    ]))
}

fn build_equality(q: &Query<'_>) -> Option<String> {
    let quoted = q.quoted();
    let status_column = q
        .candidates()
        .find_map(|entity| entity.attribute_like(&["status"]).map(|attr| (entity, attr)));

    let (entity, column, value) = match (quoted, status_column) {
        (Some(value), Some((entity, column)))
            if q.has("status") || STATUS_WORDS.contains(&value.to_ascii_lowercase().as_str()) =>
        {
            (entity, column, value.to_string())
        }
        (Some(value), _) => {
            let (entity, column) = q.candidates().find_map(|entity| {
                entity
                    .attribute_mentioned_in(&q.lowered)
                    .map(|attr| (entity, attr))
            })?;
            (entity, column, value.to_string())
        }
        (None, Some((entity, column))) => (entity, column, q.status_value()?),
        (None, None) => return None,
    };

    Some(statement(vec![
        "SELECT *".to_string(),
        format!("FROM {}", entity.name),
        format!("WHERE {} = {}", column, sql_literal(&value)),
    ]))
}

fn build_aggregate(q: &Query<'_>) -> Option<String> {
    // An entity holding both the grouping column and a numeric one wins
    let grouped = q.candidates().find_map(|entity| {
        let column = numeric_attribute(entity)?;
        let group = group_column(q, entity, column)?;
        Some((entity, column, Some(group)))
    });

    let (entity, column, group) = match grouped {
        Some(found) => found,
        None => {
            let (entity, column) = numeric_column(q)?;
            (entity, column, group_column(q, entity, column))
        }
    };

    let (func, prefix) = if q.has_any(AVERAGE_KEYWORDS) {
        ("AVG", "avg")
    } else {
        ("SUM", "sum")
    };
    let alias = format!("{}_{}", prefix, column.to_ascii_lowercase());

    let lines = match group {
        Some(group) => vec![
            format!("SELECT {}, {}({}) AS {}", group, func, column, alias),
            format!("FROM {}", entity.name),
            format!("GROUP BY {}", group),
            format!("ORDER BY {} DESC", alias),
        ],
        None => vec![
            format!("SELECT {}({}) AS {}", func, column, alias),
            format!("FROM {}", entity.name),
        ],
    };
    Some(statement(lines))
}

/// Column named after "by"/"per", e.g. "by category" or "per user" -> user_id.
fn group_column<'a>(q: &Query<'_>, entity: &'a Entity, aggregated: &str) -> Option<&'a str> {
    GROUP_BY.captures_iter(&q.lowered).find_map(|caps| {
        let word = caps.get(1)?.as_str();
        let singular = singularize(word);
        let prefix = format!("{}_", singular);
        entity
            .attributes
            .iter()
            .filter(|attr| attr.as_str() != aggregated)
            .find(|attr| {
                let lower = attr.to_ascii_lowercase();
                lower == word || lower == singular || lower.starts_with(&prefix)
            })
            .map(String::as_str)
    })
}

fn build_recent(q: &Query<'_>) -> Option<String> {
    let (entity, column) = q
        .candidates()
        .find_map(|entity| entity.attribute_like(DATE_HINTS).map(|attr| (entity, attr)))?;

    let Some(caps) = PERIOD.captures(&q.lowered) else {
        return Some(statement(vec![
            "SELECT *".to_string(),
            format!("FROM {}", entity.name),
            format!("ORDER BY {} DESC", column),
            "LIMIT 10".to_string(),
        ]));
    };

    // Only overflow fails to parse a run of digits
    let count: u32 = match caps.get(1) {
        Some(n) => n.as_str().parse().unwrap_or(u32::MAX),
        None => 1,
    };
    let unit_days = match caps.get(2).map(|unit| unit.as_str()) {
        Some("week") => 7,
        Some("month") => 30,
        Some("year") => 365,
        _ => 1,
    };

    Some(statement(vec![
        "SELECT *".to_string(),
        format!("FROM {}", entity.name),
        format!(
            "WHERE {} >= DATE_SUB(NOW(), INTERVAL {} DAY)",
            column,
            count.saturating_mul(unit_days)
        ),
        format!("ORDER BY {} DESC", column),
    ]))
}

fn build_join(q: &Query<'_>) -> Option<String> {
    let (left, right) = join_pair(q)?;
    let select = format!("SELECT {}.*, {}.*", left.name, right.name);
    let from = format!("FROM {}", left.name);

    let lines = match q.model.relationship_between(&left.name, &right.name) {
        Some(rel) if rel.kind == RelationshipKind::ManyToMany => {
            match bridge_entity(q.model, left, right) {
                Some(bridge) => vec![
                    select,
                    from,
                    format!(
                        "LEFT JOIN {} ON {}.{} = {}.{}",
                        bridge.name,
                        bridge.name,
                        bridge.foreign_key_to(left),
                        left.name,
                        left.primary_key()
                    ),
                    format!(
                        "LEFT JOIN {} ON {}.{} = {}.{}",
                        right.name,
                        right.name,
                        right.primary_key(),
                        bridge.name,
                        bridge.foreign_key_to(right)
                    ),
                ],
                None => vec![select, from, direct_join(left, right, left.is_named(&rel.from))],
            }
        }
        Some(rel) => vec![select, from, direct_join(left, right, left.is_named(&rel.from))],
        None => vec![
            select,
            from,
            format!("LEFT JOIN {} ON {}.id = {}.id", right.name, left.name, right.name),
        ],
    };

    Some(statement(lines))
}

// The parent side of a relationship owns the key the child references
fn direct_join(left: &Entity, right: &Entity, left_is_parent: bool) -> String {
    let (parent, child) = if left_is_parent { (left, right) } else { (right, left) };
    format!(
        "LEFT JOIN {} ON {}.{} = {}.{}",
        right.name,
        child.name,
        child.foreign_key_to(parent),
        parent.name,
        parent.primary_key()
    )
}

fn join_pair<'a>(q: &Query<'a>) -> Option<(&'a Entity, &'a Entity)> {
    if let [first, second, ..] = q.mentioned.as_slice() {
        return Some((*first, *second));
    }

    let anchor = q.target()?;
    let related = q.model.relationships.iter().find_map(|rel| {
        let other = if anchor.is_named(&rel.from) {
            q.model.entity(&rel.to)
        } else if anchor.is_named(&rel.to) {
            q.model.entity(&rel.from)
        } else {
            None
        };
        other.filter(|entity| !std::ptr::eq(*entity, anchor))
    });

    let partner = related.or_else(|| {
        q.model
            .entities
            .iter()
            .find(|entity| !std::ptr::eq(*entity, anchor))
    })?;
    Some((anchor, partner))
}

fn bridge_entity<'a>(model: &'a ErModel, left: &Entity, right: &Entity) -> Option<&'a Entity> {
    model.entities.iter().find(|entity| {
        !std::ptr::eq(*entity, left)
            && !std::ptr::eq(*entity, right)
            && entity.reference_to(left).is_some()
            && entity.reference_to(right).is_some()
    })
}

fn build_search(q: &Query<'_>) -> Option<String> {
    let (entity, column) = q.candidates().find_map(|entity| {
        entity
            .attribute_like(TEXT_HINTS)
            .or_else(|| entity.attributes.iter().map(String::as_str).find(|attr| !is_identifier(attr)))
            .map(|attr| (entity, attr))
    })?;

    let term = SEARCH_TERM
        .captures(q.raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or("search_term");

    Some(statement(vec![
        "SELECT *".to_string(),
        format!("FROM {}", entity.name),
        format!("WHERE {} LIKE {}", column, sql_literal(&format!("%{}%", term))),
    ]))
}

fn build_default(q: &Query<'_>) -> Option<String> {
    q.model
        .entities
        .first()
        .map(|entity| format!("SELECT * FROM {};", entity.name))
}
