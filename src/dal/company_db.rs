use sqlx::PgConnection;

/// Inserts the company if its domain is new and returns its id. An existing
/// row keeps its original name.
pub async fn upsert_company(
    con: &mut PgConnection,
    domain: &str,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        insert into companies
            (domain, name)
        values
            ($1, $2)
        on conflict (domain) do update set
            domain = excluded.domain
        returning id
        "#,
    )
    .bind(domain)
    .bind(name)
    .fetch_one(&mut *con)
    .await
}
