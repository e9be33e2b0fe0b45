use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::catalog::filter::{Dimension, FilterPredicate, FilterTarget, RESULT_CAP};
use crate::catalog::rating::{RatingSample, RunningMean};
use crate::catalog::store::PromptStore;
use crate::errors::AppError;
use crate::models::dimension::{DepartmentFunction, NamedEntity};
use crate::models::prompt::{PromptView, RatingUpdate};

/// PostgreSQL-backed catalog.
#[derive(Clone)]
pub struct PgPromptStore {
    pool: PgPool,
}

impl PgPromptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_entities(&self, table: &'static str) -> Result<Vec<NamedEntity>, AppError> {
        let sql = format!("SELECT id, name FROM {table} ORDER BY name, id");
        Ok(sqlx::query_as::<_, NamedEntity>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Table aliases `(link, entity)` used for a dimension's outer joins.
fn join_aliases(dimension: Dimension) -> (&'static str, &'static str) {
    match dimension {
        Dimension::Department => ("pd", "d"),
        Dimension::Function => ("pf", "f"),
        Dimension::Application => ("pap", "app"),
        Dimension::Activity => ("pac", "act"),
    }
}

/// Builds the aggregated search query.
///
/// Every dimension is LEFT JOINed and folded with `STRING_AGG(DISTINCT ...)` so
/// prompts without links still appear. Dimension filters are correlated
/// `EXISTS` subqueries: they restrict which prompts match without trimming the
/// aggregated name lists. Only identifiers from [`Dimension`] are spliced into
/// the text; all filter values are bound.
pub fn build_search_query(predicates: &[FilterPredicate]) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<'static, Postgres> =
        QueryBuilder::new("SELECT p.id, p.title, p.body, p.rating, p.rating_count, p.soort");

    for dimension in Dimension::ALL {
        let (_, entity) = join_aliases(dimension);
        builder.push(format!(
            ", COALESCE(STRING_AGG(DISTINCT {entity}.name, ', '), '') AS {}",
            dimension.output_column()
        ));
    }

    builder.push(" FROM prompts p");
    for dimension in Dimension::ALL {
        let (link, entity) = join_aliases(dimension);
        builder.push(format!(
            " LEFT JOIN {} {link} ON {link}.prompt_id = p.id LEFT JOIN {} {entity} ON {entity}.id = {link}.{}",
            dimension.link_table(),
            dimension.entity_table(),
            dimension.link_column(),
        ));
    }

    builder.push(" WHERE TRUE");
    for predicate in predicates {
        push_predicate(&mut builder, predicate);
    }

    builder.push(" GROUP BY p.id ORDER BY p.id LIMIT ");
    builder.push_bind(RESULT_CAP);
    builder
}

fn push_predicate(builder: &mut QueryBuilder<'static, Postgres>, predicate: &FilterPredicate) {
    match predicate.target {
        FilterTarget::Soort => {
            builder.push(" AND p.soort ILIKE ");
            builder.push_bind(predicate.like_pattern());
            builder.push(r" ESCAPE '\'");
        }
        FilterTarget::Linked(dimension) => {
            builder.push(format!(
                " AND EXISTS (SELECT 1 FROM {} fl JOIN {} fe ON fe.id = fl.{} WHERE fl.prompt_id = p.id AND fe.name ILIKE ",
                dimension.link_table(),
                dimension.entity_table(),
                dimension.link_column(),
            ));
            builder.push_bind(predicate.like_pattern());
            builder.push(r" ESCAPE '\')");
        }
    }
}

#[async_trait]
impl PromptStore for PgPromptStore {
    async fn search(&self, predicates: &[FilterPredicate]) -> Result<Vec<PromptView>, AppError> {
        let mut query = build_search_query(predicates);
        let prompts = query
            .build_query_as::<PromptView>()
            .fetch_all(&self.pool)
            .await?;
        debug!(
            "Search with {} predicate(s) returned {} prompt(s)",
            predicates.len(),
            prompts.len()
        );
        Ok(prompts)
    }

    async fn rate(&self, prompt_id: i32, sample: RatingSample) -> Result<RatingUpdate, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent submissions for the same prompt.
        let current: Option<(Option<f64>, i32)> = sqlx::query_as(
            "SELECT rating, rating_count FROM prompts WHERE id = $1 FOR UPDATE",
        )
        .bind(prompt_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (mean, count) =
            current.ok_or_else(|| AppError::NotFound(format!("Prompt {prompt_id} not found")))?;
        let update = RunningMean { mean, count }.push(sample)?;

        sqlx::query("UPDATE prompts SET rating = $1, rating_count = $2 WHERE id = $3")
            .bind(update.new_rating)
            .bind(update.new_count)
            .bind(prompt_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Prompt {prompt_id} rated {}: mean {:.3} over {} rating(s)",
            sample.value(),
            update.new_rating,
            update.new_count
        );
        Ok(update)
    }

    async fn list_departments(&self) -> Result<Vec<NamedEntity>, AppError> {
        self.list_entities(Dimension::Department.entity_table()).await
    }

    async fn list_functions(&self) -> Result<Vec<NamedEntity>, AppError> {
        self.list_entities(Dimension::Function.entity_table()).await
    }

    async fn list_activities(&self) -> Result<Vec<NamedEntity>, AppError> {
        self.list_entities(Dimension::Activity.entity_table()).await
    }

    async fn department_functions(&self) -> Result<Vec<DepartmentFunction>, AppError> {
        Ok(sqlx::query_as::<_, DepartmentFunction>(
            r#"
            SELECT d.id AS department_id, d.name AS department_name,
                   f.id AS function_id, f.name AS function_name
            FROM departments d
            JOIN department_functions df ON df.department_id = d.id
            JOIN functions f ON f.id = df.function_id
            ORDER BY d.name, f.name, d.id, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn functions_of(&self, department_id: i32) -> Result<Vec<NamedEntity>, AppError> {
        Ok(sqlx::query_as::<_, NamedEntity>(
            r#"
            SELECT f.id, f.name
            FROM functions f
            JOIN department_functions df ON df.function_id = f.id
            WHERE df.department_id = $1
            ORDER BY f.name, f.id
            "#,
        )
        .bind(department_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn activities_of(&self, function_id: i32) -> Result<Vec<NamedEntity>, AppError> {
        Ok(sqlx::query_as::<_, NamedEntity>(
            r#"
            SELECT a.id, a.name
            FROM activities a
            JOIN function_activities fa ON fa.activity_id = a.id
            WHERE fa.function_id = $1
            ORDER BY a.name, a.id
            "#,
        )
        .bind(function_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
