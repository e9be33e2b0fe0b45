//! In-process catalog backend.
//!
//! The catalog is loaded once from a [`CatalogSeed`] and is read-only afterwards
//! except for each prompt's rating, which sits behind its own mutex. Linked
//! names are folded per prompt at load time so search never walks link tables.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::filter::{Dimension, FilterPredicate, FilterTarget, RESULT_CAP};
use crate::catalog::projection::DimensionLabels;
use crate::catalog::rating::{RatingSample, RunningMean, MAX_RATING, MIN_RATING};
use crate::catalog::store::PromptStore;
use crate::errors::AppError;
use crate::models::dimension::{DepartmentFunction, NamedEntity};
use crate::models::prompt::{PromptView, RatingUpdate};

/// JSON document describing a whole catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub departments: Vec<NamedEntity>,
    #[serde(default)]
    pub functions: Vec<NamedEntity>,
    #[serde(default)]
    pub applications: Vec<NamedEntity>,
    #[serde(default)]
    pub activities: Vec<NamedEntity>,
    #[serde(default)]
    pub prompts: Vec<SeedPrompt>,
    #[serde(default)]
    pub department_functions: Vec<DepartmentFunctionLink>,
    #[serde(default)]
    pub function_activities: Vec<FunctionActivityLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPrompt {
    pub id: i32,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub soort: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_count: i32,
    #[serde(default)]
    pub departments: Vec<i32>,
    #[serde(default)]
    pub functions: Vec<i32>,
    #[serde(default)]
    pub applications: Vec<i32>,
    #[serde(default)]
    pub activities: Vec<i32>,
}

impl SeedPrompt {
    fn links(&self, dimension: Dimension) -> &[i32] {
        match dimension {
            Dimension::Department => &self.departments,
            Dimension::Function => &self.functions,
            Dimension::Application => &self.applications,
            Dimension::Activity => &self.activities,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentFunctionLink {
    pub department_id: i32,
    pub function_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionActivityLink {
    pub function_id: i32,
    pub activity_id: i32,
}

struct PromptEntry {
    title: String,
    body: String,
    soort: String,
    labels: DimensionLabels,
    rating: Mutex<RunningMean>,
}

impl PromptEntry {
    fn satisfies(&self, predicate: &FilterPredicate) -> bool {
        match predicate.target {
            FilterTarget::Soort => predicate.matches(&self.soort),
            FilterTarget::Linked(dimension) => self
                .labels
                .get(dimension)
                .iter()
                .any(|name| predicate.matches(name)),
        }
    }
}

pub struct InMemoryPromptStore {
    prompts: BTreeMap<i32, PromptEntry>,
    departments: Vec<NamedEntity>,
    functions: Vec<NamedEntity>,
    activities: Vec<NamedEntity>,
    department_functions: Vec<DepartmentFunction>,
    functions_by_department: HashMap<i32, Vec<NamedEntity>>,
    activities_by_function: HashMap<i32, Vec<NamedEntity>>,
}

impl InMemoryPromptStore {
    /// Reads and validates a JSON seed file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;
        let seed: CatalogSeed = serde_json::from_str(&raw)
            .with_context(|| format!("Seed file '{}' is not a valid catalog", path.display()))?;
        let store = Self::from_seed(seed)?;
        info!(
            "Loaded {} prompt(s) from seed file {}",
            store.prompts.len(),
            path.display()
        );
        Ok(store)
    }

    /// Builds the store, rejecting dangling links, duplicate ids and ratings
    /// that break the running-mean invariants.
    pub fn from_seed(seed: CatalogSeed) -> Result<Self> {
        let departments = index_entities("department", &seed.departments)?;
        let functions = index_entities("function", &seed.functions)?;
        let applications = index_entities("application", &seed.applications)?;
        let activities = index_entities("activity", &seed.activities)?;

        let names_of = |dimension: Dimension| match dimension {
            Dimension::Department => &departments,
            Dimension::Function => &functions,
            Dimension::Application => &applications,
            Dimension::Activity => &activities,
        };

        let mut prompts = BTreeMap::new();
        for prompt in seed.prompts {
            validate_rating(&prompt)?;

            let mut labels = DimensionLabels::default();
            for dimension in Dimension::ALL {
                for linked_id in prompt.links(dimension) {
                    let name = names_of(dimension).get(linked_id).with_context(|| {
                        format!(
                            "Prompt {} links unknown {} id {linked_id}",
                            prompt.id,
                            dimension.entity_table()
                        )
                    })?;
                    labels.insert(dimension, name.clone());
                }
            }

            let entry = PromptEntry {
                title: prompt.title,
                body: prompt.body,
                soort: prompt.soort,
                labels,
                rating: Mutex::new(RunningMean {
                    mean: prompt.rating,
                    count: prompt.rating_count,
                }),
            };
            if prompts.insert(prompt.id, entry).is_some() {
                bail!("Duplicate prompt id {}", prompt.id);
            }
        }

        let mut department_functions = Vec::new();
        let mut functions_by_department: HashMap<i32, Vec<NamedEntity>> = HashMap::new();
        let mut seen = HashSet::new();
        for link in &seed.department_functions {
            let department = lookup(&departments, "department", link.department_id)?;
            let function = lookup(&functions, "function", link.function_id)?;
            if !seen.insert((link.department_id, link.function_id)) {
                continue;
            }
            department_functions.push(DepartmentFunction {
                department_id: link.department_id,
                department_name: department.clone(),
                function_id: link.function_id,
                function_name: function.clone(),
            });
            functions_by_department
                .entry(link.department_id)
                .or_default()
                .push(NamedEntity {
                    id: link.function_id,
                    name: function.clone(),
                });
        }
        department_functions.sort_by(|a, b| {
            (&a.department_name, &a.function_name, a.department_id, a.function_id).cmp(&(
                &b.department_name,
                &b.function_name,
                b.department_id,
                b.function_id,
            ))
        });

        let mut activities_by_function: HashMap<i32, Vec<NamedEntity>> = HashMap::new();
        let mut seen = HashSet::new();
        for link in &seed.function_activities {
            lookup(&functions, "function", link.function_id)?;
            let activity = lookup(&activities, "activity", link.activity_id)?;
            if !seen.insert((link.function_id, link.activity_id)) {
                continue;
            }
            activities_by_function
                .entry(link.function_id)
                .or_default()
                .push(NamedEntity {
                    id: link.activity_id,
                    name: activity.clone(),
                });
        }

        for children in functions_by_department
            .values_mut()
            .chain(activities_by_function.values_mut())
        {
            sort_by_name(children);
        }

        Ok(Self {
            prompts,
            departments: sorted(seed.departments),
            functions: sorted(seed.functions),
            activities: sorted(seed.activities),
            department_functions,
            functions_by_department,
            activities_by_function,
        })
    }
}

fn index_entities(kind: &str, entities: &[NamedEntity]) -> Result<HashMap<i32, String>> {
    let mut index = HashMap::with_capacity(entities.len());
    for entity in entities {
        if index.insert(entity.id, entity.name.clone()).is_some() {
            bail!("Duplicate {kind} id {}", entity.id);
        }
    }
    Ok(index)
}

fn lookup<'a>(index: &'a HashMap<i32, String>, kind: &str, id: i32) -> Result<&'a String> {
    index
        .get(&id)
        .with_context(|| format!("Hierarchy references unknown {kind} id {id}"))
}

fn validate_rating(prompt: &SeedPrompt) -> Result<()> {
    let range = f64::from(MIN_RATING)..=f64::from(MAX_RATING);
    match (prompt.rating, prompt.rating_count) {
        (_, count) if count < 0 => bail!("Prompt {} has negative rating_count", prompt.id),
        (None, 0) => Ok(()),
        (Some(rating), count) if count > 0 && range.contains(&rating) => Ok(()),
        (rating, count) => bail!(
            "Prompt {} has inconsistent rating {rating:?} for rating_count {count}",
            prompt.id
        ),
    }
}

fn sort_by_name(entities: &mut [NamedEntity]) {
    entities.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

fn sorted(mut entities: Vec<NamedEntity>) -> Vec<NamedEntity> {
    sort_by_name(&mut entities);
    entities
}

#[async_trait]
impl PromptStore for InMemoryPromptStore {
    async fn search(&self, predicates: &[FilterPredicate]) -> Result<Vec<PromptView>, AppError> {
        let mut results = Vec::new();
        for (&id, entry) in &self.prompts {
            if results.len() as i64 >= RESULT_CAP {
                break;
            }
            if !predicates.iter().all(|p| entry.satisfies(p)) {
                continue;
            }
            let rating = *entry.rating.lock().await;
            results.push(PromptView {
                id,
                title: entry.title.clone(),
                body: entry.body.clone(),
                rating: rating.mean,
                rating_count: rating.count,
                soort: entry.soort.clone(),
                departments: entry.labels.joined(Dimension::Department),
                functions: entry.labels.joined(Dimension::Function),
                activities: entry.labels.joined(Dimension::Activity),
                applications: entry.labels.joined(Dimension::Application),
            });
        }
        debug!(
            "Search with {} predicate(s) returned {} prompt(s)",
            predicates.len(),
            results.len()
        );
        Ok(results)
    }

    async fn rate(&self, prompt_id: i32, sample: RatingSample) -> Result<RatingUpdate, AppError> {
        let entry = self
            .prompts
            .get(&prompt_id)
            .ok_or_else(|| AppError::NotFound(format!("Prompt {prompt_id} not found")))?;

        let mut state = entry.rating.lock().await;
        let update = state.push(sample)?;
        *state = update.into();

        info!(
            "Prompt {prompt_id} rated {}: mean {:.3} over {} rating(s)",
            sample.value(),
            update.new_rating,
            update.new_count
        );
        Ok(update)
    }

    async fn list_departments(&self) -> Result<Vec<NamedEntity>, AppError> {
        Ok(self.departments.clone())
    }

    async fn list_functions(&self) -> Result<Vec<NamedEntity>, AppError> {
        Ok(self.functions.clone())
    }

    async fn list_activities(&self) -> Result<Vec<NamedEntity>, AppError> {
        Ok(self.activities.clone())
    }

    async fn department_functions(&self) -> Result<Vec<DepartmentFunction>, AppError> {
        Ok(self.department_functions.clone())
    }

    async fn functions_of(&self, department_id: i32) -> Result<Vec<NamedEntity>, AppError> {
        Ok(self
            .functions_by_department
            .get(&department_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn activities_of(&self, function_id: i32) -> Result<Vec<NamedEntity>, AppError> {
        Ok(self
            .activities_by_function
            .get(&function_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::filter::SearchFilters;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;

    pub(crate) fn sample_seed() -> CatalogSeed {
        serde_json::from_value(json!({
            "departments": [
                { "id": 1, "name": "Finance" },
                { "id": 2, "name": "Marketing" },
                { "id": 3, "name": "Human Resources" },
                { "id": 4, "name": "Legal" }
            ],
            "functions": [
                { "id": 1, "name": "Controller" },
                { "id": 2, "name": "Content Creator" },
                { "id": 3, "name": "Recruiter" },
                { "id": 4, "name": "Analyst" }
            ],
            "applications": [
                { "id": 1, "name": "Excel" },
                { "id": 2, "name": "Outlook" }
            ],
            "activities": [
                { "id": 1, "name": "Budgeting" },
                { "id": 2, "name": "Reporting" },
                { "id": 3, "name": "Social Media" }
            ],
            "prompts": [
                {
                    "id": 1, "title": "Quarterly budget", "body": "Draft a budget for {quarter}.",
                    "soort": "Analysis",
                    "departments": [1], "functions": [1], "applications": [1], "activities": [1, 2]
                },
                {
                    "id": 2, "title": "Campaign post", "body": "Write a post about {product}.",
                    "soort": "Copywriting", "rating": 4.0, "rating_count": 1,
                    "departments": [2], "functions": [2], "activities": [3]
                },
                {
                    "id": 3, "title": "Generic summary", "body": "Summarize the text below.",
                    "soort": "Summary"
                },
                {
                    "id": 4, "title": "Budget email", "body": "Announce the new budget.",
                    "soort": "Email",
                    "departments": [2, 1, 1], "applications": [2]
                }
            ],
            "department_functions": [
                { "department_id": 1, "function_id": 4 },
                { "department_id": 1, "function_id": 1 },
                { "department_id": 2, "function_id": 2 },
                { "department_id": 3, "function_id": 3 }
            ],
            "function_activities": [
                { "function_id": 1, "activity_id": 2 },
                { "function_id": 1, "activity_id": 1 },
                { "function_id": 2, "activity_id": 3 }
            ]
        }))
        .unwrap()
    }

    pub(crate) fn sample_store() -> InMemoryPromptStore {
        InMemoryPromptStore::from_seed(sample_seed()).unwrap()
    }

    fn filters(
        function: Option<&str>,
        department: Option<&str>,
        soort: Option<&str>,
        activity: Option<&str>,
    ) -> SearchFilters {
        SearchFilters {
            function: function.map(str::to_string),
            department: department.map(str::to_string),
            soort: soort.map(str::to_string),
            activity: activity.map(str::to_string),
        }
    }

    async fn search_ids(store: &InMemoryPromptStore, f: SearchFilters) -> Vec<i32> {
        store
            .search(&f.predicates())
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect()
    }

    #[tokio::test]
    async fn test_unfiltered_returns_all_in_id_order() {
        let store = sample_store();
        assert_eq!(search_ids(&store, SearchFilters::default()).await, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_department_substring_is_case_insensitive() {
        let store = sample_store();
        assert_eq!(
            search_ids(&store, filters(None, Some("Fina"), None, None)).await,
            vec![1, 4]
        );
        assert_eq!(
            search_ids(&store, filters(None, Some("fINA"), None, None)).await,
            vec![1, 4]
        );
    }

    #[tokio::test]
    async fn test_filtered_dimension_still_projects_all_links() {
        let store = sample_store();
        let results = store
            .search(&filters(None, Some("fina"), None, None).predicates())
            .await
            .unwrap();
        let budget_email = results.iter().find(|p| p.id == 4).unwrap();
        assert_eq!(budget_email.departments, "Finance, Marketing");
        assert_eq!(budget_email.applications, "Outlook");
    }

    #[tokio::test]
    async fn test_missing_links_render_as_empty_strings() {
        let store = sample_store();
        let results = store.search(&[]).await.unwrap();
        let generic = results.iter().find(|p| p.id == 3).unwrap();
        assert_eq!(generic.departments, "");
        assert_eq!(generic.functions, "");
        assert_eq!(generic.applications, "");
        assert_eq!(generic.activities, "");
        assert_eq!(generic.rating, None);
        assert_eq!(generic.rating_count, 0);
    }

    #[tokio::test]
    async fn test_filters_are_anded() {
        let store = sample_store();
        // Prompt 4 is in Finance but has no function links.
        assert_eq!(
            search_ids(&store, filters(Some("control"), Some("fin"), None, None)).await,
            vec![1]
        );
        assert_eq!(
            search_ids(&store, filters(None, Some("fin"), Some("MAIL"), None)).await,
            vec![4]
        );
        assert_eq!(
            search_ids(&store, filters(None, None, None, Some("report"))).await,
            vec![1]
        );
        assert!(search_ids(&store, filters(Some("recruit"), Some("fin"), None, None))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_wildcard_characters_match_literally() {
        let store = sample_store();
        assert!(search_ids(&store, filters(None, None, Some("%"), None))
            .await
            .is_empty());
        assert!(search_ids(&store, filters(None, Some("_"), None, None))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_results_capped_at_fifty() {
        let prompts: Vec<_> = (1..=60)
            .rev()
            .map(|id| json!({ "id": id, "title": format!("P{id}"), "body": "", "soort": "Bulk" }))
            .collect();
        let seed: CatalogSeed = serde_json::from_value(json!({ "prompts": prompts })).unwrap();
        let store = InMemoryPromptStore::from_seed(seed).unwrap();

        let ids = search_ids(&store, filters(None, None, Some("bulk"), None)).await;
        assert_eq!(ids.len(), 50);
        assert_eq!(ids, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_rate_updates_running_mean() {
        let store = sample_store();
        let update = store.rate(2, RatingSample::new(3).unwrap()).await.unwrap();
        assert_eq!(update.new_count, 2);
        assert!((update.new_rating - 3.5).abs() < f64::EPSILON);

        let results = store.search(&[]).await.unwrap();
        let prompt = results.iter().find(|p| p.id == 2).unwrap();
        assert_eq!(prompt.rating, Some(3.5));
        assert_eq!(prompt.rating_count, 2);
    }

    #[tokio::test]
    async fn test_first_rating_sets_mean() {
        let store = sample_store();
        let update = store.rate(1, RatingSample::new(2).unwrap()).await.unwrap();
        assert_eq!(
            update,
            RatingUpdate {
                new_rating: 2.0,
                new_count: 1
            }
        );
    }

    #[tokio::test]
    async fn test_rate_unknown_prompt_leaves_state_unchanged() {
        let store = sample_store();
        let before = store.search(&[]).await.unwrap();

        let err = store.rate(99, RatingSample::new(4).unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(store.search(&[]).await.unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ratings_are_not_lost() {
        let store = Arc::new(sample_store());
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let sample = RatingSample::new(if i % 2 == 0 { 5 } else { 1 }).unwrap();
                store.rate(1, sample).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let results = store.search(&[]).await.unwrap();
        let prompt = results.iter().find(|p| p.id == 1).unwrap();
        assert_eq!(prompt.rating_count, 40);
        assert!((prompt.rating.unwrap() - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_listings_sorted_by_name() {
        let store = sample_store();
        let names: Vec<_> = store
            .list_departments()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Finance", "Human Resources", "Legal", "Marketing"]);

        let names: Vec<_> = store
            .list_activities()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Budgeting", "Reporting", "Social Media"]);
    }

    #[tokio::test]
    async fn test_hierarchy_lookups() {
        let store = sample_store();

        let finance = store.functions_of(1).await.unwrap();
        assert_eq!(
            finance,
            vec![
                NamedEntity { id: 4, name: "Analyst".to_string() },
                NamedEntity { id: 1, name: "Controller".to_string() },
            ]
        );
        assert!(store.functions_of(4).await.unwrap().is_empty());
        assert!(store.functions_of(404).await.unwrap().is_empty());

        let controller: Vec<_> = store
            .activities_of(1)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(controller, vec!["Budgeting", "Reporting"]);
        assert!(store.activities_of(4).await.unwrap().is_empty());

        let edges = store.department_functions().await.unwrap();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[0].department_name, "Finance");
        assert_eq!(edges[0].function_name, "Analyst");
        assert_eq!(edges[3].department_name, "Marketing");
    }

    #[test]
    fn test_seed_rejects_dangling_link() {
        let mut seed = sample_seed();
        seed.prompts[0].functions.push(77);
        let err = InMemoryPromptStore::from_seed(seed).err().unwrap();
        assert!(err.to_string().contains("unknown functions id 77"));
    }

    #[test]
    fn test_seed_rejects_inconsistent_ratings() {
        let mut seed = sample_seed();
        seed.prompts[0].rating = Some(3.0);
        assert!(InMemoryPromptStore::from_seed(seed).is_err());

        let mut seed = sample_seed();
        seed.prompts[1].rating = Some(7.0);
        assert!(InMemoryPromptStore::from_seed(seed).is_err());

        let mut seed = sample_seed();
        seed.prompts[1].rating = None;
        assert!(InMemoryPromptStore::from_seed(seed).is_err());
    }

    #[test]
    fn test_seed_rejects_duplicate_ids() {
        let mut seed = sample_seed();
        seed.departments.push(NamedEntity {
            id: 1,
            name: "Finance again".to_string(),
        });
        assert!(InMemoryPromptStore::from_seed(seed).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"departments":[{{"id":1,"name":"Finance"}}],"prompts":[{{"id":7,"title":"T","body":"B","departments":[1]}}]}}"#
        )
        .unwrap();

        let store = InMemoryPromptStore::load(file.path()).unwrap();
        let results = store.search(&[]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 7);
        assert_eq!(results[0].departments, "Finance");
        assert_eq!(results[0].soort, "");
    }

    #[tokio::test]
    async fn test_bundled_seed_loads() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/seed/catalog.json"));
        let store = InMemoryPromptStore::load(path).unwrap();
        let results = store.search(&[]).await.unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(store.functions_of(1).await.unwrap()[0].name, "Controller");
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(InMemoryPromptStore::load(file.path()).is_err());
    }
}
