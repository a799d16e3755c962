pub mod inspect;
pub mod schema;
pub mod store;
pub mod updater;
pub mod work_set;

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    use crate::config::LangCode;

    pub fn sv() -> LangCode {
        LangCode::parse("sv").unwrap()
    }

    /// In-memory store shaped like the pre-filtered snapshot: `joined` with
    /// `item_id` plus an unrelated column, and nothing language-specific yet.
    pub fn fixture_conn(item_ids: &[i64]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE joined (item_id INTEGER, title TEXT);")
            .unwrap();
        for id in item_ids {
            conn.execute(
                "INSERT INTO joined (item_id, title) VALUES (?1, ?2)",
                rusqlite::params![id, format!("Q{id}")],
            )
            .unwrap();
        }
        conn
    }

    /// `fixture_conn` with the schema prepared for `sv`.
    pub fn prepared_conn(item_ids: &[i64]) -> Connection {
        let mut conn = fixture_conn(item_ids);
        crate::database_ops::schema::prepare_schema(&mut conn, &sv()).unwrap();
        conn
    }
}
