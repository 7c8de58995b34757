use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::job::{Job, JobState};

pub async fn insert_job(pool: &PgPool, competitor: &str) -> Result<Job, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        r#"
        insert into scrape_jobs
            (id, competitor, state)
        values
            ($1, $2, $3)
        returning
            id, competitor, state, requested_at, completed_at, error_message
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(competitor)
    .bind(JobState::Queued)
    .fetch_one(pool)
    .await
}

pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        r#"
        select
            id, competitor, state, requested_at, completed_at, error_message
        from
            scrape_jobs
        where
            id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Moves a queued job to running. Returns false if another request got there first.
pub async fn mark_job_running(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        update scrape_jobs set
            state = $2
        where
            id = $1 and
            state = $3
        "#,
    )
    .bind(id)
    .bind(JobState::Running)
    .bind(JobState::Queued)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn mark_job_done(
    pool: &PgPool,
    id: Uuid,
    note: Option<&str>,
) -> Result<(), sqlx::Error> {
    finish_job(pool, id, JobState::Done, note).await
}

pub async fn mark_job_failed(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    finish_job(pool, id, JobState::Error, Some(message)).await
}

async fn finish_job(
    pool: &PgPool,
    id: Uuid,
    state: JobState,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        update scrape_jobs set
            state = $2,
            completed_at = now(),
            error_message = $3
        where
            id = $1
        "#,
    )
    .bind(id)
    .bind(state)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}
