//! Named deletion policies between tables.
//!
//! Foreign keys in the schema carry no `ON DELETE` action; what happens to
//! dependent rows is declared here and executed explicitly, dependents first,
//! inside the same transaction as the parent delete.

use sqlx::{Pool, Postgres};

use crate::error::{AppError, AppResult};

/// What happens to dependent rows when their parent is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Dependent rows are deleted (after their own dependents)
    Cascade,
    /// The reference on dependent rows is set to NULL
    Nullify,
}

/// A foreign key from `table.foreign_key` to the parent's `id`
#[derive(Debug)]
pub struct Relationship {
    pub table: &'static str,
    pub foreign_key: &'static str,
    pub policy: DeletePolicy,
    /// Column naming a stored file that goes away with the row
    pub file_column: Option<&'static str>,
    /// Relationships pointing at rows of `table`
    pub dependents: &'static [Relationship],
}

/// A deletable table and the relationships pointing at it
#[derive(Debug)]
pub struct Entity {
    pub table: &'static str,
    pub label: &'static str,
    pub file_column: Option<&'static str>,
    pub relationships: &'static [Relationship],
}

pub const BOOK_BORROW_RECORDS: Relationship = Relationship {
    table: "borrow_records",
    foreign_key: "book_id",
    policy: DeletePolicy::Cascade,
    file_column: None,
    dependents: &[],
};

pub const AUTHOR_BOOKS: Relationship = Relationship {
    table: "books",
    foreign_key: "author_id",
    policy: DeletePolicy::Cascade,
    file_column: Some("cover_image"),
    dependents: &[BOOK_BORROW_RECORDS],
};

pub const CATEGORY_BOOKS: Relationship = Relationship {
    table: "books",
    foreign_key: "category_id",
    policy: DeletePolicy::Nullify,
    file_column: None,
    dependents: &[],
};

pub const AUTHORS: Entity = Entity {
    table: "authors",
    label: "Author",
    file_column: None,
    relationships: &[AUTHOR_BOOKS],
};

pub const CATEGORIES: Entity = Entity {
    table: "categories",
    label: "Category",
    file_column: None,
    relationships: &[CATEGORY_BOOKS],
};

pub const BOOKS: Entity = Entity {
    table: "books",
    label: "Book",
    file_column: Some("cover_image"),
    relationships: &[BOOK_BORROW_RECORDS],
};

/// One statement of a deletion plan; every statement binds the parent id as `$1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStatement {
    pub table: &'static str,
    pub policy: Option<DeletePolicy>,
    pub sql: String,
    /// Set when the statement returns file paths of the deleted rows
    pub file_column: Option<&'static str>,
}

/// Ordered statements deleting one row of `entity`; the parent delete comes last
pub fn deletion_plan(entity: &Entity) -> Vec<PlannedStatement> {
    let mut plan = Vec::new();
    for relationship in entity.relationships {
        plan_relationship(relationship, "= $1", &mut plan);
    }
    plan.push(PlannedStatement {
        table: entity.table,
        policy: None,
        sql: format!(
            "DELETE FROM {} WHERE id = $1{}",
            entity.table,
            returning(entity.file_column)
        ),
        file_column: entity.file_column,
    });
    plan
}

fn plan_relationship(rel: &Relationship, parent_match: &str, plan: &mut Vec<PlannedStatement>) {
    match rel.policy {
        DeletePolicy::Nullify => plan.push(PlannedStatement {
            table: rel.table,
            policy: Some(DeletePolicy::Nullify),
            sql: format!(
                "UPDATE {t} SET {fk} = NULL, updated_at = NOW() WHERE {fk} {m}",
                t = rel.table,
                fk = rel.foreign_key,
                m = parent_match
            ),
            file_column: None,
        }),
        DeletePolicy::Cascade => {
            let child_match = format!(
                "IN (SELECT id FROM {} WHERE {} {})",
                rel.table, rel.foreign_key, parent_match
            );
            for dependent in rel.dependents {
                plan_relationship(dependent, &child_match, plan);
            }
            plan.push(PlannedStatement {
                table: rel.table,
                policy: Some(DeletePolicy::Cascade),
                sql: format!(
                    "DELETE FROM {} WHERE {} {}{}",
                    rel.table,
                    rel.foreign_key,
                    parent_match,
                    returning(rel.file_column)
                ),
                file_column: rel.file_column,
            });
        }
    }
}

fn returning(file_column: Option<&str>) -> String {
    file_column
        .map(|column| format!(" RETURNING {}", column))
        .unwrap_or_default()
}

/// Rows touched by each statement of an executed plan
#[derive(Debug, Default)]
pub struct DeletionReport {
    pub affected: Vec<(&'static str, DeletePolicy, u64)>,
    /// Stored files of every deleted row, to be removed once the delete is committed
    pub files: Vec<String>,
}

impl DeletionReport {
    pub fn count(&self, table: &str, policy: DeletePolicy) -> u64 {
        self.affected
            .iter()
            .filter(|(t, p, _)| *t == table && *p == policy)
            .map(|(_, _, n)| n)
            .sum()
    }
}

/// Lock the parent row, run the plan and commit; a missing parent is `NotFound`
pub async fn delete_with_policies(
    pool: &Pool<Postgres>,
    entity: &Entity,
    id: i32,
) -> AppResult<DeletionReport> {
    let mut tx = pool.begin().await?;

    let lock = format!("SELECT id FROM {} WHERE id = $1 FOR UPDATE", entity.table);
    sqlx::query_scalar::<_, i32>(&lock)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} with id {} not found", entity.label, id)))?;

    let mut report = DeletionReport::default();
    for statement in deletion_plan(entity) {
        let rows_affected = if statement.file_column.is_some() {
            let files: Vec<Option<String>> = sqlx::query_scalar(&statement.sql)
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
            let count = files.len() as u64;
            report.files.extend(files.into_iter().flatten());
            count
        } else {
            sqlx::query(&statement.sql)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        };

        if let Some(policy) = statement.policy {
            report.affected.push((statement.table, policy, rows_affected));
        }
    }

    tx.commit().await?;
    Ok(report)
}
