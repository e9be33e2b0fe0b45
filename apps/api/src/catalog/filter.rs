//! Filter descriptors for the prompt search.
//!
//! Incoming query parameters are turned into a list of typed predicates. Each
//! backend renders the same list: PostgreSQL as bound `ILIKE` parameters, the
//! in-memory store by evaluating [`FilterPredicate::matches`] directly. Filter
//! values never become part of query text.

use serde::Deserialize;

/// Maximum number of prompts a single search returns.
pub const RESULT_CAP: i64 = 50;

/// A many-to-many classification axis over prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Department,
    Function,
    Application,
    Activity,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Department,
        Dimension::Function,
        Dimension::Application,
        Dimension::Activity,
    ];

    /// Table holding the `(id, name)` entities of this dimension.
    pub fn entity_table(self) -> &'static str {
        match self {
            Dimension::Department => "departments",
            Dimension::Function => "functions",
            Dimension::Application => "applications",
            Dimension::Activity => "activities",
        }
    }

    /// Link table between prompts and this dimension.
    pub fn link_table(self) -> &'static str {
        match self {
            Dimension::Department => "prompt_departments",
            Dimension::Function => "prompt_functions",
            Dimension::Application => "prompt_applications",
            Dimension::Activity => "prompt_activities",
        }
    }

    /// Foreign-key column in the link table pointing at the entity.
    pub fn link_column(self) -> &'static str {
        match self {
            Dimension::Department => "department_id",
            Dimension::Function => "function_id",
            Dimension::Application => "application_id",
            Dimension::Activity => "activity_id",
        }
    }

    /// Name of the aggregated output column.
    pub fn output_column(self) -> &'static str {
        self.entity_table()
    }
}

/// What a predicate is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    /// Names of the entities linked to the prompt in this dimension.
    Linked(Dimension),
    /// The prompt's own `soort` label.
    Soort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// Case-insensitive substring containment.
    ContainsIgnoreCase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPredicate {
    pub target: FilterTarget,
    pub op: MatchOp,
    pub value: String,
}

impl FilterPredicate {
    pub fn contains(target: FilterTarget, value: impl Into<String>) -> Self {
        Self {
            target,
            op: MatchOp::ContainsIgnoreCase,
            value: value.into(),
        }
    }

    /// Evaluates the predicate against a single candidate string.
    pub fn matches(&self, candidate: &str) -> bool {
        match self.op {
            MatchOp::ContainsIgnoreCase => candidate
                .to_lowercase()
                .contains(&self.value.to_lowercase()),
        }
    }

    /// The bound `LIKE` pattern for this predicate. Wildcards in the user value
    /// are escaped so they match literally.
    pub fn like_pattern(&self) -> String {
        match self.op {
            MatchOp::ContainsIgnoreCase => format!("%{}%", escape_like(&self.value)),
        }
    }
}

/// Escapes `\`, `%` and `_` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Optional search filters as they arrive on the query string.
///
/// The Dutch aliases keep the existing front end working.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SearchFilters {
    #[serde(default, alias = "functie")]
    pub function: Option<String>,
    #[serde(default, alias = "afdeling")]
    pub department: Option<String>,
    #[serde(default)]
    pub soort: Option<String>,
    #[serde(default, alias = "werkzaamheid")]
    pub activity: Option<String>,
}

impl SearchFilters {
    /// Builds the AND-ed predicate list. Missing and blank filters are skipped.
    pub fn predicates(&self) -> Vec<FilterPredicate> {
        let candidates = [
            (
                FilterTarget::Linked(Dimension::Function),
                self.function.as_deref(),
            ),
            (
                FilterTarget::Linked(Dimension::Department),
                self.department.as_deref(),
            ),
            (FilterTarget::Soort, self.soort.as_deref()),
            (
                FilterTarget::Linked(Dimension::Activity),
                self.activity.as_deref(),
            ),
        ];

        candidates
            .into_iter()
            .filter_map(|(target, value)| {
                let value = value?;
                if value.trim().is_empty() {
                    return None;
                }
                Some(FilterPredicate::contains(target, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filters_no_predicates() {
        assert!(SearchFilters::default().predicates().is_empty());
    }

    #[test]
    fn test_blank_filters_are_skipped() {
        let filters = SearchFilters {
            function: Some(String::new()),
            department: Some("   ".to_string()),
            soort: None,
            activity: Some("Report".to_string()),
        };
        let predicates = filters.predicates();
        assert_eq!(predicates.len(), 1);
        assert_eq!(
            predicates[0].target,
            FilterTarget::Linked(Dimension::Activity)
        );
    }

    #[test]
    fn test_all_filters_in_fixed_order() {
        let filters = SearchFilters {
            function: Some("dev".to_string()),
            department: Some("fin".to_string()),
            soort: Some("mail".to_string()),
            activity: Some("plan".to_string()),
        };
        let targets: Vec<_> = filters.predicates().iter().map(|p| p.target).collect();
        assert_eq!(
            targets,
            vec![
                FilterTarget::Linked(Dimension::Function),
                FilterTarget::Linked(Dimension::Department),
                FilterTarget::Soort,
                FilterTarget::Linked(Dimension::Activity),
            ]
        );
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let p = FilterPredicate::contains(FilterTarget::Linked(Dimension::Department), "Fina");
        assert!(p.matches("Finance"));
        assert!(p.matches("FINANCE & Control"));
        assert!(!p.matches("Marketing"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        let p = FilterPredicate::contains(FilterTarget::Soort, r"50%_off\");
        assert_eq!(p.like_pattern(), r"%50\%\_off\\%");
    }

    #[test]
    fn test_like_pattern_leaves_quotes_as_data() {
        let p = FilterPredicate::contains(FilterTarget::Soort, "x'; DROP TABLE prompts; --");
        assert_eq!(p.like_pattern(), "%x'; DROP TABLE prompts; --%");
    }

    #[test]
    fn test_legacy_query_names_deserialize() {
        let filters: SearchFilters =
            serde_json::from_str(r#"{"functie":"dev","afdeling":"fin","werkzaamheid":"plan"}"#)
                .unwrap();
        assert_eq!(filters.function.as_deref(), Some("dev"));
        assert_eq!(filters.department.as_deref(), Some("fin"));
        assert_eq!(filters.activity.as_deref(), Some("plan"));
    }
}
