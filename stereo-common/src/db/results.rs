//! Result persistence
//!
//! A region page is saved in one transaction: the familiarity row and every
//! annotation row commit together or not at all. Rows are never updated or
//! deleted by the application.

use crate::db::models::{AnnotationRecord, FamiliarityRecord};
use crate::selection::Participant;
use crate::submission::RegionSubmission;
use crate::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

/// Rows written by one committed region page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedRegion {
    pub familiarity_id: i64,
    pub annotations_inserted: u64,
}

/// Save one validated region page atomically
///
/// Dropping the transaction on any error rolls back the familiarity insert
/// together with any annotation rows.
pub async fn save_region(
    pool: &SqlitePool,
    participant: &Participant,
    target_region: &str,
    submission: &RegionSubmission,
) -> Result<SavedRegion> {
    let mut tx = pool.begin().await?;

    let familiarity_id = sqlx::query(
        r#"
        INSERT INTO familiarity (native_region, target_region, rating, participant_name, age, sex)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&participant.native_region)
    .bind(target_region)
    .bind(submission.familiarity)
    .bind(&participant.name)
    .bind(participant.age)
    .bind(&participant.sex)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    debug!(
        familiarity_id,
        target_region,
        "Familiarity inserted (pre-commit)"
    );

    let mut annotations_inserted = 0;
    if !submission.annotations.is_empty() {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO annotations (native_region, target_region, participant_name, age, sex, \
             category, superset_attribute, annotation, offensiveness_rating) ",
        );
        builder.push_values(&submission.annotations, |mut row, entry| {
            row.push_bind(&participant.native_region)
                .push_bind(target_region)
                .push_bind(&participant.name)
                .push_bind(participant.age)
                .push_bind(&participant.sex)
                .push_bind(&entry.category)
                .push_bind(&entry.superset)
                .push_bind(entry.label.as_str())
                .push_bind(entry.offensiveness);
        });
        annotations_inserted = builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;

    info!(
        participant = %participant.name,
        target_region,
        annotations = annotations_inserted,
        "Region saved"
    );

    Ok(SavedRegion {
        familiarity_id,
        annotations_inserted,
    })
}

/// All annotation rows, newest first
pub async fn fetch_annotations(pool: &SqlitePool) -> Result<Vec<AnnotationRecord>> {
    let rows = sqlx::query_as::<_, AnnotationRecord>(
        r#"
        SELECT id, native_region, target_region, participant_name, age, sex,
               category, superset_attribute, annotation, offensiveness_rating,
               CAST(timestamp AS TEXT) AS timestamp
        FROM annotations
        ORDER BY timestamp DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// All familiarity rows, newest first
pub async fn fetch_familiarity(pool: &SqlitePool) -> Result<Vec<FamiliarityRecord>> {
    let rows = sqlx::query_as::<_, FamiliarityRecord>(
        r#"
        SELECT id, native_region, target_region, rating, participant_name, age, sex,
               CAST(timestamp AS TEXT) AS timestamp
        FROM familiarity
        ORDER BY timestamp DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Row counts for (annotations, familiarity)
pub async fn count_rows(pool: &SqlitePool) -> Result<(i64, i64)> {
    let annotations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM annotations")
        .fetch_one(pool)
        .await?;
    let familiarity: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM familiarity")
        .fetch_one(pool)
        .await?;
    Ok((annotations, familiarity))
}
