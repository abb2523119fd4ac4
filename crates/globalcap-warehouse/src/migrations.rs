use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_asset_snapshots",
        sql: r#"
CREATE TABLE IF NOT EXISTS asset_snapshots (
    ticker TEXT NOT NULL,
    snapshot_date DATE NOT NULL,
    rank INTEGER NOT NULL,
    name TEXT NOT NULL,
    market_cap_usd DOUBLE NOT NULL,
    current_price DOUBLE NOT NULL,
    previous_close DOUBLE NOT NULL,
    percentage_change DOUBLE NOT NULL,
    volume DOUBLE NOT NULL,
    primary_exchange TEXT NOT NULL,
    country TEXT NOT NULL,
    sector TEXT NOT NULL,
    industry TEXT NOT NULL,
    asset_type TEXT NOT NULL,
    image TEXT,
    currency TEXT NOT NULL,
    run_id TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(ticker, snapshot_date)
);

CREATE TABLE IF NOT EXISTS snapshot_runs (
    run_id TEXT NOT NULL,
    snapshot_date DATE NOT NULL,
    row_count BIGINT NOT NULL,
    cleared BOOLEAN NOT NULL,
    uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_snapshot_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_asset_snapshots_date_rank ON asset_snapshots(snapshot_date, rank);
CREATE INDEX IF NOT EXISTS idx_snapshot_runs_date ON snapshot_runs(snapshot_date);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [migration.version],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let connection = Connection::open_in_memory().expect("in-memory db");
        apply_migrations(&connection).expect("first pass");
        apply_migrations(&connection).expect("second pass");

        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
