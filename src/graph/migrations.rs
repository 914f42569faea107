use rusqlite::{Connection, OptionalExtension, params};

pub const SCHEMA_VERSION: i64 = 1;

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        BEGIN;
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS generations (
            project TEXT PRIMARY KEY,
            generation INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY,
            project TEXT NOT NULL,
            label TEXT NOT NULL,
            key TEXT NOT NULL,
            properties TEXT NOT NULL,
            origin TEXT NOT NULL,
            file_path TEXT,
            generation INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS relationships (
            id INTEGER PRIMARY KEY,
            project TEXT NOT NULL,
            source_label TEXT NOT NULL,
            source_key TEXT NOT NULL,
            rel_type TEXT NOT NULL,
            target_label TEXT NOT NULL,
            target_key TEXT NOT NULL,
            properties TEXT NOT NULL,
            origin TEXT NOT NULL,
            file_path TEXT,
            generation INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(project, file_path);
        CREATE INDEX IF NOT EXISTS idx_nodes_origin ON nodes(project, origin);
        CREATE INDEX IF NOT EXISTS idx_relationships_file ON relationships(project, file_path);
        CREATE INDEX IF NOT EXISTS idx_relationships_origin ON relationships(project, origin);
        CREATE INDEX IF NOT EXISTS idx_relationships_target
            ON relationships(project, target_label, target_key);
        COMMIT;
        ",
    )?;

    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if current.as_deref() != Some(SCHEMA_VERSION.to_string().as_str()) {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![SCHEMA_VERSION.to_string()],
        )?;
    }
    Ok(())
}

/// Uniqueness of node and relationship identity. Safe to run repeatedly.
pub fn ensure_constraints(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE UNIQUE INDEX IF NOT EXISTS uq_nodes_identity
            ON nodes(project, label, key);
        CREATE UNIQUE INDEX IF NOT EXISTS uq_relationships_identity
            ON relationships(project, source_label, source_key, rel_type, target_label, target_key);
        ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_and_constraints_are_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        ensure_constraints(&conn).unwrap();
        ensure_constraints(&conn).unwrap();
        let version: String = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, "1");

        conn.execute(
            "INSERT INTO nodes (project, label, key, properties, origin, generation)
             VALUES ('p', 'Module', 'p.a', '{}', 'declaration', 1)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO nodes (project, label, key, properties, origin, generation)
             VALUES ('p', 'Module', 'p.a', '{}', 'declaration', 1)",
            [],
        );
        assert!(dup.is_err());
    }
}
