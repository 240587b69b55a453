use sqlx::SqliteConnection;

use crate::db_types::Client;

pub async fn fetch_active(conn: &mut SqliteConnection) -> Result<Vec<Client>, sqlx::Error> {
    let clients =
        sqlx::query_as("SELECT * FROM clients WHERE is_active = 1 ORDER BY id ASC").fetch_all(conn).await?;
    Ok(clients)
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Client>, sqlx::Error> {
    let client = sqlx::query_as("SELECT * FROM clients WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(client)
}
