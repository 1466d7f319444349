//! SQL migration definitions for the LinkHunter database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: organisations, projects, prospects, existing backlinks",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS organisations (
    id                        TEXT PRIMARY KEY,
    name                      TEXT NOT NULL,
    plan                      TEXT NOT NULL,
    monthly_prospect_limit    INTEGER NOT NULL,
    prospects_used_this_month INTEGER NOT NULL DEFAULT 0,
    created_at                TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id              TEXT PRIMARY KEY,
    org_id          TEXT NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    target_url      TEXT NOT NULL,
    target_keywords TEXT NOT NULL DEFAULT '[]',
    niche           TEXT,
    description     TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_org ON projects(org_id);

CREATE TABLE IF NOT EXISTS prospects (
    id                 TEXT PRIMARY KEY,
    project_id         TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    org_id             TEXT NOT NULL,
    prospect_url       TEXT NOT NULL,
    prospect_domain    TEXT NOT NULL,
    page_title         TEXT,
    page_url           TEXT,
    snippet            TEXT,
    domain_authority   INTEGER,
    spam_score         INTEGER,
    contact_name       TEXT,
    contact_email      TEXT,
    contact_role       TEXT,
    contact_source     TEXT,
    opportunity_type   TEXT,
    linkability_score  INTEGER,
    relevance_score    INTEGER,
    status             TEXT NOT NULL DEFAULT 'identified',
    entry_method       TEXT NOT NULL,
    first_contacted_at TEXT,
    last_contacted_at  TEXT,
    link_live          INTEGER NOT NULL DEFAULT 0,
    link_url           TEXT,
    link_verified_at   TEXT,
    link_lost_at       TEXT,
    notes              TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_prospects_project ON prospects(project_id, org_id);
CREATE INDEX IF NOT EXISTS idx_prospects_domain ON prospects(project_id, prospect_domain);
CREATE INDEX IF NOT EXISTS idx_prospects_status ON prospects(project_id, status);

CREATE TABLE IF NOT EXISTS existing_backlinks (
    id             TEXT PRIMARY KEY,
    project_id     TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    org_id         TEXT NOT NULL,
    linking_domain TEXT NOT NULL,
    linking_url    TEXT NOT NULL,
    dr             INTEGER NOT NULL DEFAULT 0,
    first_seen     TEXT,
    UNIQUE(project_id, linking_url)
);

CREATE INDEX IF NOT EXISTS idx_backlinks_project ON existing_backlinks(project_id, org_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Import jobs, outreach emails, agent messages",
            sql: r#"
CREATE TABLE IF NOT EXISTS import_jobs (
    id              TEXT PRIMARY KEY,
    project_id      TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    org_id          TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    entry_method    TEXT NOT NULL,
    total_submitted INTEGER NOT NULL DEFAULT 0,
    total_passed    INTEGER NOT NULL DEFAULT 0,
    total_review    INTEGER NOT NULL DEFAULT 0,
    total_failed    INTEGER NOT NULL DEFAULT 0,
    input_payload   TEXT NOT NULL,
    results_payload TEXT,
    created_at      TEXT NOT NULL,
    completed_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_import_jobs_project ON import_jobs(project_id, org_id);

CREATE TABLE IF NOT EXISTS outreach_emails (
    id              TEXT PRIMARY KEY,
    prospect_id     TEXT NOT NULL REFERENCES prospects(id) ON DELETE CASCADE,
    org_id          TEXT NOT NULL,
    project_id      TEXT NOT NULL,
    subject         TEXT NOT NULL,
    body_html       TEXT NOT NULL,
    body_text       TEXT NOT NULL,
    ai_generated    INTEGER NOT NULL DEFAULT 0,
    status          TEXT NOT NULL DEFAULT 'draft',
    is_followup     INTEGER NOT NULL DEFAULT 0,
    followup_number INTEGER NOT NULL DEFAULT 0,
    replied_at      TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_emails_project ON outreach_emails(project_id, org_id);
CREATE INDEX IF NOT EXISTS idx_emails_prospect ON outreach_emails(prospect_id);

CREATE TABLE IF NOT EXISTS agent_messages (
    id         TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    user_id    TEXT NOT NULL,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    tool_calls TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agent_messages_project ON agent_messages(project_id, created_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
