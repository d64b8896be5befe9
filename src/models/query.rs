use serde::{Deserialize, Serialize};

/// Comparison applied between a record field and a constraint value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "eq", alias = "equal")]
    Equal,
    #[serde(rename = "nq", alias = "ne", alias = "not_equal")]
    NotEqual,
    #[serde(rename = "gt", alias = "greater")]
    Greater,
    #[serde(rename = "ge", alias = "greater_or_equal")]
    GreaterOrEqual,
    #[serde(rename = "lt", alias = "less")]
    Less,
    #[serde(rename = "le", alias = "less_or_equal")]
    LessOrEqual,
    #[serde(rename = "in", alias = "contains")]
    Contains,
    #[serde(rename = "ni", alias = "not_contains")]
    NotContains,
}

impl Relation {
    pub const ALL: [Relation; 8] = [
        Relation::Equal,
        Relation::NotEqual,
        Relation::Greater,
        Relation::GreaterOrEqual,
        Relation::Less,
        Relation::LessOrEqual,
        Relation::Contains,
        Relation::NotContains,
    ];

    /// Short token used in the query file.
    pub fn token(&self) -> &'static str {
        match self {
            Relation::Equal => "eq",
            Relation::NotEqual => "nq",
            Relation::Greater => "gt",
            Relation::GreaterOrEqual => "ge",
            Relation::Less => "lt",
            Relation::LessOrEqual => "le",
            Relation::Contains => "in",
            Relation::NotContains => "ni",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// One attribute-comparison rule attached to a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub id: u32,
    pub attribute_key: String,
    pub comparison_value: String,
    pub relation: Relation,
    pub normalize: bool,
}

impl Constraint {
    pub fn new(
        attribute_key: impl Into<String>,
        relation: Relation,
        comparison_value: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            attribute_key: attribute_key.into(),
            comparison_value: comparison_value.into(),
            relation,
            normalize: true,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

/// A user search: the string sent to every marketplace plus the rules a
/// listing has to meet to be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub id: u32,
    pub query_string: String,
    pub constraints: Vec<Constraint>,
    pub normalize: bool,
}

impl Query {
    pub fn new(query_string: impl Into<String>, constraints: Vec<Constraint>) -> Self {
        Self {
            id: 0,
            query_string: query_string.into(),
            constraints,
            normalize: true,
        }
    }

    /// Attribute keys used by this query's constraints that no record has.
    pub fn unknown_attributes(&self) -> Vec<&str> {
        self.constraints
            .iter()
            .map(|c| c.attribute_key.as_str())
            .filter(|key| !super::Record::has_attribute(key))
            .collect()
    }
}
