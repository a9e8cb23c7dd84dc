//! v001: source_configs and scan_jobs.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS source_configs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    host TEXT NOT NULL,
    port INTEGER NOT NULL CHECK (port BETWEEN 0 AND 65535),
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    database_name TEXT NOT NULL,
    driver TEXT NOT NULL,
    created_at TEXT NOT NULL
) STRICT;

CREATE TABLE IF NOT EXISTS scan_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_config_id INTEGER NOT NULL REFERENCES source_configs(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('pending', 'in_progress', 'completed', 'failed')),
    progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
    failure_reason TEXT,
    findings_json TEXT,
    report_ref TEXT
) STRICT;

CREATE INDEX IF NOT EXISTS idx_scan_jobs_created ON scan_jobs(created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_scan_jobs_state ON scan_jobs(state);
CREATE INDEX IF NOT EXISTS idx_scan_jobs_source ON scan_jobs(source_config_id);
"#;
