//! Flattening of linked dimension names into display strings.

use std::collections::BTreeSet;

use crate::catalog::filter::Dimension;

/// Separator used for every aggregated dimension field.
pub const NAME_SEPARATOR: &str = ", ";

/// Distinct names linked to a single prompt, one set per dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionLabels {
    pub departments: BTreeSet<String>,
    pub functions: BTreeSet<String>,
    pub applications: BTreeSet<String>,
    pub activities: BTreeSet<String>,
}

impl DimensionLabels {
    pub fn get(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Department => &self.departments,
            Dimension::Function => &self.functions,
            Dimension::Application => &self.applications,
            Dimension::Activity => &self.activities,
        }
    }

    pub fn insert(&mut self, dimension: Dimension, name: impl Into<String>) {
        let set = match dimension {
            Dimension::Department => &mut self.departments,
            Dimension::Function => &mut self.functions,
            Dimension::Application => &mut self.applications,
            Dimension::Activity => &mut self.activities,
        };
        set.insert(name.into());
    }

    /// Display value for one dimension; `""` when nothing is linked.
    pub fn joined(&self, dimension: Dimension) -> String {
        join_names(self.get(dimension))
    }
}

/// Joins distinct names with [`NAME_SEPARATOR`], dropping duplicates.
pub fn join_names<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let distinct: BTreeSet<String> = names
        .into_iter()
        .map(|n| n.as_ref().to_string())
        .collect();
    distinct
        .into_iter()
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR)
}
