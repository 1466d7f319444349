//! libSQL storage layer for LinkHunter.
//!
//! The [`Storage`] struct wraps a local libSQL database holding
//! organisations, projects, prospects, existing backlinks, import jobs,
//! outreach drafts and agent messages.
//!
//! Every project-level read and write is scoped by `org_id`; a record owned
//! by another organisation behaves exactly like a missing one.

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use linkhunter_shared::{
    AgentMessage, AgentRole, EmailStatus, EntryMethod, ExistingBacklink, ImportJob,
    ImportJobPatch, ImportJobStatus, LinkHunterError, NewAgentMessage, NewOutreachEmail,
    NewProspect, Organisation, OutreachEmail, PlanTier, Project, Prospect, ProspectStatus,
    Result, ToolInvocation, new_record_id,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Contact fields written by enrichment.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub source: String,
}

/// Link verification outcome written back onto a prospect.
#[derive(Debug, Clone)]
pub struct LinkStatusUpdate {
    pub link_live: bool,
    pub link_url: Option<String>,
    pub verified_at: DateTime<Utc>,
    pub lost_at: Option<DateTime<Utc>>,
    /// New status, when the check changes it.
    pub status: Option<ProspectStatus>,
}

/// A backlink reported by the metrics provider.
#[derive(Debug, Clone)]
pub struct NewExistingBacklink {
    pub linking_domain: String,
    pub linking_url: String,
    pub dr: u32,
    pub first_seen: Option<String>,
}

const PROSPECT_COLUMNS: &str = "id, project_id, org_id, prospect_url, prospect_domain, \
    page_title, page_url, snippet, domain_authority, spam_score, contact_name, contact_email, \
    contact_role, contact_source, opportunity_type, linkability_score, relevance_score, status, \
    entry_method, first_contacted_at, last_contacted_at, link_live, link_url, link_verified_at, \
    link_lost_at, notes, created_at, updated_at";

const PROJECT_COLUMNS: &str =
    "id, org_id, name, target_url, target_keywords, niche, description, created_at";

const JOB_COLUMNS: &str = "id, project_id, org_id, status, entry_method, total_submitted, \
    total_passed, total_review, total_failed, input_payload, results_payload, created_at, \
    completed_at";

const EMAIL_COLUMNS: &str = "id, prospect_id, org_id, project_id, subject, body_html, body_text, \
    ai_generated, status, is_followup, followup_number, replied_at, created_at";

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinkHunterError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode (reporting commands).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LinkHunterError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LinkHunterError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Organisations
    // -----------------------------------------------------------------------

    /// Create an organisation with the plan's monthly prospect limit.
    pub async fn create_organisation(&self, name: &str, plan: PlanTier) -> Result<Organisation> {
        self.check_writable()?;
        let org = Organisation {
            id: new_record_id(),
            name: name.to_string(),
            plan,
            monthly_prospect_limit: plan.monthly_prospect_limit(),
            prospects_used_this_month: 0,
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO organisations
                 (id, name, plan, monthly_prospect_limit, prospects_used_this_month, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    org.id.as_str(),
                    org.name.as_str(),
                    plan.as_str(),
                    i64::from(org.monthly_prospect_limit),
                    org.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(org)
    }

    pub async fn get_organisation(&self, org_id: &str) -> Result<Option<Organisation>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, plan, monthly_prospect_limit, prospects_used_this_month, created_at
                 FROM organisations WHERE id = ?1",
                params![org_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(Organisation {
                id: text(&row, 0)?,
                name: text(&row, 1)?,
                plan: text(&row, 2)?.parse()?,
                monthly_prospect_limit: uint(&row, 3)?,
                prospects_used_this_month: uint(&row, 4)?,
                created_at: ts(&row, 5)?,
            })),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub async fn create_project(
        &self,
        org_id: &str,
        name: &str,
        target_url: &str,
        target_keywords: &[String],
    ) -> Result<Project> {
        self.check_writable()?;
        let project = Project {
            id: new_record_id(),
            org_id: org_id.to_string(),
            name: name.to_string(),
            target_url: target_url.to_string(),
            target_keywords: target_keywords.to_vec(),
            niche: None,
            description: None,
            created_at: Utc::now(),
        };
        let keywords = serde_json::to_string(&project.target_keywords)
            .map_err(|e| LinkHunterError::Storage(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO projects (id, org_id, name, target_url, target_keywords, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id.as_str(),
                    org_id,
                    name,
                    target_url,
                    keywords,
                    project.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &str, org_id: &str) -> Result<Option<Project>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1 AND org_id = ?2"),
                params![project_id, org_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_project(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_projects(&self, org_id: &str) -> Result<Vec<Project>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE org_id = ?1 ORDER BY name"),
                params![org_id],
            )
            .await
            .map_err(storage_err)?;

        let mut projects = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            projects.push(row_to_project(&row)?);
        }
        Ok(projects)
    }

    // -----------------------------------------------------------------------
    // Prospects
    // -----------------------------------------------------------------------

    /// Insert prospects in one transaction. Returns the created rows.
    pub async fn insert_prospects(
        &self,
        project_id: &str,
        org_id: &str,
        prospects: &[NewProspect],
    ) -> Result<Vec<Prospect>> {
        self.check_writable()?;
        if prospects.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        let created = insert_prospect_rows(&tx, project_id, org_id, prospects).await?;
        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(count = created.len(), project_id, "inserted prospects");
        Ok(created)
    }

    /// Commit an open import job atomically: insert `prospects`, charge the
    /// organisation for the rows created and mark the job complete.
    ///
    /// Fails without writing anything when the job is no longer running.
    pub async fn commit_import_job(
        &self,
        job_id: &str,
        project_id: &str,
        org_id: &str,
        prospects: &[NewProspect],
    ) -> Result<Vec<Prospect>> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        let closed = tx
            .execute(
                "UPDATE import_jobs SET status = ?1, completed_at = ?2
                 WHERE id = ?3 AND org_id = ?4 AND project_id = ?5 AND status = ?6",
                params![
                    ImportJobStatus::Complete.as_str(),
                    Utc::now().to_rfc3339(),
                    job_id,
                    org_id,
                    project_id,
                    ImportJobStatus::Running.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        if closed == 0 {
            tx.rollback().await.map_err(storage_err)?;
            return Err(LinkHunterError::Storage(format!(
                "import job {job_id} is no longer open"
            )));
        }

        let created = insert_prospect_rows(&tx, project_id, org_id, prospects).await?;
        tx.execute(
            "UPDATE organisations
             SET prospects_used_this_month = prospects_used_this_month + ?1
             WHERE id = ?2",
            params![created.len() as i64, org_id],
        )
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(count = created.len(), job_id, "import job committed");
        Ok(created)
    }

    pub async fn get_prospect(&self, prospect_id: &str, org_id: &str) -> Result<Option<Prospect>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PROSPECT_COLUMNS} FROM prospects WHERE id = ?1 AND org_id = ?2"),
                params![prospect_id, org_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_prospect(&row)?)),
            None => Ok(None),
        }
    }

    /// All prospects of a project, optionally filtered by status, newest first.
    pub async fn list_prospects(
        &self,
        project_id: &str,
        org_id: &str,
        status: Option<ProspectStatus>,
    ) -> Result<Vec<Prospect>> {
        let mut rows = match status {
            Some(status) => self
                .conn
                .query(
                    &format!(
                        "SELECT {PROSPECT_COLUMNS} FROM prospects
                         WHERE project_id = ?1 AND org_id = ?2 AND status = ?3
                         ORDER BY created_at DESC"
                    ),
                    params![project_id, org_id, status.as_str()],
                )
                .await,
            None => self
                .conn
                .query(
                    &format!(
                        "SELECT {PROSPECT_COLUMNS} FROM prospects
                         WHERE project_id = ?1 AND org_id = ?2
                         ORDER BY created_at DESC"
                    ),
                    params![project_id, org_id],
                )
                .await,
        }
        .map_err(storage_err)?;

        let mut prospects = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            prospects.push(row_to_prospect(&row)?);
        }
        Ok(prospects)
    }

    /// Domains already tracked as prospects for a project.
    pub async fn prospect_domains(&self, project_id: &str, org_id: &str) -> Result<HashSet<String>> {
        self.domain_set(
            "SELECT DISTINCT prospect_domain FROM prospects WHERE project_id = ?1 AND org_id = ?2",
            project_id,
            org_id,
        )
        .await
    }

    /// Write contact fields and optionally move the prospect to `status`.
    pub async fn update_prospect_contact(
        &self,
        prospect_id: &str,
        org_id: &str,
        contact: &ContactUpdate,
        status: Option<ProspectStatus>,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE prospects
                 SET contact_name = ?1, contact_email = ?2, contact_role = ?3,
                     contact_source = ?4, status = COALESCE(?5, status), updated_at = ?6
                 WHERE id = ?7 AND org_id = ?8",
                params![
                    contact.name.as_deref(),
                    contact.email.as_deref(),
                    contact.role.as_deref(),
                    contact.source.as_str(),
                    status.map(|s| s.as_str()),
                    Utc::now().to_rfc3339(),
                    prospect_id,
                    org_id
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Set a prospect's status. Notes replace existing notes when given;
    /// `contacted_at` stamps the last (and, if unset, first) contact time.
    pub async fn set_prospect_status(
        &self,
        prospect_id: &str,
        org_id: &str,
        status: ProspectStatus,
        notes: Option<&str>,
        contacted_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        self.check_writable()?;
        let contacted = contacted_at.map(|t| t.to_rfc3339());
        let affected = self
            .conn
            .execute(
                "UPDATE prospects
                 SET status = ?1,
                     notes = COALESCE(?2, notes),
                     last_contacted_at = COALESCE(?3, last_contacted_at),
                     first_contacted_at = COALESCE(first_contacted_at, ?3),
                     updated_at = ?4
                 WHERE id = ?5 AND org_id = ?6",
                params![
                    status.as_str(),
                    notes,
                    contacted.as_deref(),
                    Utc::now().to_rfc3339(),
                    prospect_id,
                    org_id
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    /// Move `identified`/`enriched` prospects to `outreach_drafted`; later
    /// stages are left alone. Returns whether the status changed.
    pub async fn mark_outreach_drafted(&self, prospect_id: &str, org_id: &str) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "UPDATE prospects SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND org_id = ?4 AND status IN (?5, ?6)",
                params![
                    ProspectStatus::OutreachDrafted.as_str(),
                    Utc::now().to_rfc3339(),
                    prospect_id,
                    org_id,
                    ProspectStatus::Identified.as_str(),
                    ProspectStatus::Enriched.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    /// Record a link verification result.
    pub async fn record_link_status(
        &self,
        prospect_id: &str,
        org_id: &str,
        update: &LinkStatusUpdate,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE prospects
                 SET link_live = ?1, link_url = ?2, link_verified_at = ?3, link_lost_at = ?4,
                     status = COALESCE(?5, status), updated_at = ?6
                 WHERE id = ?7 AND org_id = ?8",
                params![
                    i64::from(update.link_live),
                    update.link_url.as_deref(),
                    update.verified_at.to_rfc3339(),
                    update.lost_at.map(|t| t.to_rfc3339()),
                    update.status.map(|s| s.as_str()),
                    Utc::now().to_rfc3339(),
                    prospect_id,
                    org_id
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Existing backlinks
    // -----------------------------------------------------------------------

    pub async fn list_existing_backlinks(
        &self,
        project_id: &str,
        org_id: &str,
    ) -> Result<Vec<ExistingBacklink>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, project_id, org_id, linking_domain, linking_url, dr, first_seen
                 FROM existing_backlinks WHERE project_id = ?1 AND org_id = ?2
                 ORDER BY dr DESC, linking_domain",
                params![project_id, org_id],
            )
            .await
            .map_err(storage_err)?;

        let mut links = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            links.push(ExistingBacklink {
                id: text(&row, 0)?,
                project_id: text(&row, 1)?,
                org_id: text(&row, 2)?,
                linking_domain: text(&row, 3)?,
                linking_url: text(&row, 4)?,
                dr: uint(&row, 5)?,
                first_seen: row.get::<String>(6).ok(),
            });
        }
        Ok(links)
    }

    /// Domains that already link to the project.
    pub async fn existing_backlink_domains(
        &self,
        project_id: &str,
        org_id: &str,
    ) -> Result<HashSet<String>> {
        self.domain_set(
            "SELECT DISTINCT linking_domain FROM existing_backlinks
             WHERE project_id = ?1 AND org_id = ?2",
            project_id,
            org_id,
        )
        .await
    }

    /// Insert or refresh backlinks keyed by `(project_id, linking_url)`.
    pub async fn upsert_existing_backlinks(
        &self,
        project_id: &str,
        org_id: &str,
        links: &[NewExistingBacklink],
    ) -> Result<usize> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        for link in links {
            tx.execute(
                "INSERT INTO existing_backlinks
                 (id, project_id, org_id, linking_domain, linking_url, dr, first_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(project_id, linking_url)
                 DO UPDATE SET linking_domain = excluded.linking_domain, dr = excluded.dr",
                params![
                    new_record_id(),
                    project_id,
                    org_id,
                    link.linking_domain.as_str(),
                    link.linking_url.as_str(),
                    i64::from(link.dr),
                    link.first_seen.as_deref()
                ],
            )
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;
        Ok(links.len())
    }

    async fn domain_set(&self, sql: &str, project_id: &str, org_id: &str) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query(sql, params![project_id, org_id])
            .await
            .map_err(storage_err)?;
        let mut domains = HashSet::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            domains.insert(text(&row, 0)?.to_lowercase());
        }
        Ok(domains)
    }

    // -----------------------------------------------------------------------
    // Import jobs
    // -----------------------------------------------------------------------

    /// Create a `pending` import job.
    pub async fn create_import_job(
        &self,
        project_id: &str,
        org_id: &str,
        entry_method: EntryMethod,
        total_submitted: u32,
        input_payload: &serde_json::Value,
    ) -> Result<ImportJob> {
        self.check_writable()?;
        let job = ImportJob {
            id: new_record_id(),
            project_id: project_id.to_string(),
            org_id: org_id.to_string(),
            status: ImportJobStatus::Pending,
            entry_method,
            total_submitted,
            total_passed: 0,
            total_review: 0,
            total_failed: 0,
            input_payload: input_payload.clone(),
            results_payload: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.conn
            .execute(
                "INSERT INTO import_jobs
                 (id, project_id, org_id, status, entry_method, total_submitted,
                  input_payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.id.as_str(),
                    project_id,
                    org_id,
                    job.status.as_str(),
                    entry_method.as_str(),
                    i64::from(total_submitted),
                    input_payload.to_string(),
                    job.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(job)
    }

    pub async fn get_import_job(&self, job_id: &str, org_id: &str) -> Result<Option<ImportJob>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM import_jobs WHERE id = ?1 AND org_id = ?2"),
                params![job_id, org_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    /// Apply the non-empty fields of `patch`.
    pub async fn update_import_job(
        &self,
        job_id: &str,
        org_id: &str,
        patch: &ImportJobPatch,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE import_jobs
                 SET status = COALESCE(?1, status),
                     total_submitted = COALESCE(?2, total_submitted),
                     total_passed = COALESCE(?3, total_passed),
                     total_review = COALESCE(?4, total_review),
                     total_failed = COALESCE(?5, total_failed),
                     results_payload = COALESCE(?6, results_payload),
                     completed_at = COALESCE(?7, completed_at)
                 WHERE id = ?8 AND org_id = ?9",
                params![
                    patch.status.map(|s| s.as_str()),
                    patch.total_submitted.map(i64::from),
                    patch.total_passed.map(i64::from),
                    patch.total_review.map(i64::from),
                    patch.total_failed.map(i64::from),
                    patch.results_payload.as_ref().map(|v| v.to_string()),
                    patch.completed_at.map(|t| t.to_rfc3339()),
                    job_id,
                    org_id
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Outreach emails
    // -----------------------------------------------------------------------

    /// Persist a draft email.
    pub async fn insert_outreach_email(&self, email: &NewOutreachEmail) -> Result<OutreachEmail> {
        self.check_writable()?;
        let record = OutreachEmail {
            id: new_record_id(),
            prospect_id: email.prospect_id.clone(),
            org_id: email.org_id.clone(),
            project_id: email.project_id.clone(),
            subject: email.subject.clone(),
            body_html: email.body_html.clone(),
            body_text: email.body_text.clone(),
            ai_generated: email.ai_generated,
            status: EmailStatus::Draft,
            is_followup: email.is_followup,
            followup_number: email.followup_number,
            replied_at: None,
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO outreach_emails
                 (id, prospect_id, org_id, project_id, subject, body_html, body_text,
                  ai_generated, status, is_followup, followup_number, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.id.as_str(),
                    record.prospect_id.as_str(),
                    record.org_id.as_str(),
                    record.project_id.as_str(),
                    record.subject.as_str(),
                    record.body_html.as_str(),
                    record.body_text.as_str(),
                    i64::from(record.ai_generated),
                    record.status.as_str(),
                    i64::from(record.is_followup),
                    i64::from(record.followup_number),
                    record.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(record)
    }

    pub async fn list_outreach_emails(
        &self,
        project_id: &str,
        org_id: &str,
    ) -> Result<Vec<OutreachEmail>> {
        self.query_emails(
            &format!(
                "SELECT {EMAIL_COLUMNS} FROM outreach_emails
                 WHERE project_id = ?1 AND org_id = ?2 ORDER BY created_at"
            ),
            project_id,
            org_id,
        )
        .await
    }

    pub async fn list_prospect_emails(
        &self,
        prospect_id: &str,
        org_id: &str,
    ) -> Result<Vec<OutreachEmail>> {
        self.query_emails(
            &format!(
                "SELECT {EMAIL_COLUMNS} FROM outreach_emails
                 WHERE prospect_id = ?1 AND org_id = ?2 ORDER BY created_at"
            ),
            prospect_id,
            org_id,
        )
        .await
    }

    async fn query_emails(&self, sql: &str, key: &str, org_id: &str) -> Result<Vec<OutreachEmail>> {
        let mut rows = self
            .conn
            .query(sql, params![key, org_id])
            .await
            .map_err(storage_err)?;
        let mut emails = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            emails.push(row_to_email(&row)?);
        }
        Ok(emails)
    }

    /// Record a reply. Returns `false` when the email does not exist for the org.
    pub async fn mark_email_replied(
        &self,
        email_id: &str,
        org_id: &str,
        replied_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "UPDATE outreach_emails SET replied_at = ?1 WHERE id = ?2 AND org_id = ?3",
                params![replied_at.to_rfc3339(), email_id, org_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Agent messages
    // -----------------------------------------------------------------------

    pub async fn insert_agent_message(&self, message: &NewAgentMessage) -> Result<AgentMessage> {
        self.check_writable()?;
        let record = AgentMessage {
            id: new_record_id(),
            project_id: message.project_id.clone(),
            user_id: message.user_id.clone(),
            role: message.role,
            content: message.content.clone(),
            tool_calls: message.tool_calls.clone(),
            created_at: Utc::now(),
        };
        let tool_calls = match &record.tool_calls {
            Some(calls) => Some(
                serde_json::to_string(calls).map_err(|e| LinkHunterError::Storage(e.to_string()))?,
            ),
            None => None,
        };
        self.conn
            .execute(
                "INSERT INTO agent_messages (id, project_id, user_id, role, content, tool_calls, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.as_str(),
                    record.project_id.as_str(),
                    record.user_id.as_str(),
                    record.role.as_str(),
                    record.content.as_str(),
                    tool_calls,
                    record.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(record)
    }

    /// Conversation history for a project owned by `org_id`, oldest first.
    pub async fn list_agent_messages(
        &self,
        project_id: &str,
        org_id: &str,
    ) -> Result<Vec<AgentMessage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT m.id, m.project_id, m.user_id, m.role, m.content, m.tool_calls, m.created_at
                 FROM agent_messages m
                 JOIN projects p ON p.id = m.project_id AND p.org_id = ?2
                 WHERE m.project_id = ?1
                 ORDER BY m.created_at, m.id",
                params![project_id, org_id],
            )
            .await
            .map_err(storage_err)?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let tool_calls = match row.get::<String>(5).ok() {
                Some(raw) => Some(
                    serde_json::from_str::<Vec<ToolInvocation>>(&raw)
                        .map_err(|e| LinkHunterError::Storage(format!("invalid tool_calls: {e}")))?,
                ),
                None => None,
            };
            messages.push(AgentMessage {
                id: text(&row, 0)?,
                project_id: text(&row, 1)?,
                user_id: text(&row, 2)?,
                role: text(&row, 3)?.parse::<AgentRole>()?,
                content: text(&row, 4)?,
                tool_calls,
                created_at: ts(&row, 6)?,
            });
        }
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn storage_err(e: impl std::fmt::Display) -> LinkHunterError {
    LinkHunterError::Storage(e.to_string())
}

fn text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(storage_err)
}

fn uint(row: &libsql::Row, idx: i32) -> Result<u32> {
    let value = row.get::<i64>(idx).map_err(storage_err)?;
    u32::try_from(value).map_err(|e| LinkHunterError::Storage(format!("column {idx}: {e}")))
}

fn opt_uint(row: &libsql::Row, idx: i32) -> Option<u32> {
    row.get::<i64>(idx).ok().and_then(|v| u32::try_from(v).ok())
}

fn opt_score(row: &libsql::Row, idx: i32) -> Option<u8> {
    row.get::<i64>(idx).ok().and_then(|v| u8::try_from(v).ok())
}

fn flag(row: &libsql::Row, idx: i32) -> Result<bool> {
    Ok(row.get::<i64>(idx).map_err(storage_err)? != 0)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LinkHunterError::Storage(format!("invalid date: {e}")))
}

fn ts(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>> {
    parse_ts(&text(row, idx)?)
}

fn opt_ts(row: &libsql::Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    row.get::<String>(idx).ok().map(|s| parse_ts(&s)).transpose()
}

fn row_to_project(row: &libsql::Row) -> Result<Project> {
    let keywords: Vec<String> = serde_json::from_str(&text(row, 4)?)
        .map_err(|e| LinkHunterError::Storage(format!("invalid target_keywords: {e}")))?;
    Ok(Project {
        id: text(row, 0)?,
        org_id: text(row, 1)?,
        name: text(row, 2)?,
        target_url: text(row, 3)?,
        target_keywords: keywords,
        niche: row.get::<String>(5).ok(),
        description: row.get::<String>(6).ok(),
        created_at: ts(row, 7)?,
    })
}

fn row_to_prospect(row: &libsql::Row) -> Result<Prospect> {
    Ok(Prospect {
        id: text(row, 0)?,
        project_id: text(row, 1)?,
        org_id: text(row, 2)?,
        prospect_url: text(row, 3)?,
        prospect_domain: text(row, 4)?,
        page_title: row.get::<String>(5).ok(),
        page_url: row.get::<String>(6).ok(),
        snippet: row.get::<String>(7).ok(),
        domain_authority: opt_uint(row, 8),
        spam_score: opt_uint(row, 9),
        contact_name: row.get::<String>(10).ok(),
        contact_email: row.get::<String>(11).ok(),
        contact_role: row.get::<String>(12).ok(),
        contact_source: row.get::<String>(13).ok(),
        opportunity_type: row
            .get::<String>(14)
            .ok()
            .map(|s| s.parse())
            .transpose()?,
        linkability_score: opt_score(row, 15),
        relevance_score: opt_score(row, 16),
        status: text(row, 17)?.parse()?,
        entry_method: text(row, 18)?.parse()?,
        first_contacted_at: opt_ts(row, 19)?,
        last_contacted_at: opt_ts(row, 20)?,
        link_live: flag(row, 21)?,
        link_url: row.get::<String>(22).ok(),
        link_verified_at: opt_ts(row, 23)?,
        link_lost_at: opt_ts(row, 24)?,
        notes: row.get::<String>(25).ok(),
        created_at: ts(row, 26)?,
        updated_at: ts(row, 27)?,
    })
}

fn row_to_job(row: &libsql::Row) -> Result<ImportJob> {
    let input_payload = serde_json::from_str(&text(row, 9)?)
        .map_err(|e| LinkHunterError::Storage(format!("invalid input_payload: {e}")))?;
    let results_payload = row
        .get::<String>(10)
        .ok()
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| LinkHunterError::Storage(format!("invalid results_payload: {e}")))?;
    Ok(ImportJob {
        id: text(row, 0)?,
        project_id: text(row, 1)?,
        org_id: text(row, 2)?,
        status: text(row, 3)?.parse()?,
        entry_method: text(row, 4)?.parse()?,
        total_submitted: uint(row, 5)?,
        total_passed: uint(row, 6)?,
        total_review: uint(row, 7)?,
        total_failed: uint(row, 8)?,
        input_payload,
        results_payload,
        created_at: ts(row, 11)?,
        completed_at: opt_ts(row, 12)?,
    })
}

fn row_to_email(row: &libsql::Row) -> Result<OutreachEmail> {
    Ok(OutreachEmail {
        id: text(row, 0)?,
        prospect_id: text(row, 1)?,
        org_id: text(row, 2)?,
        project_id: text(row, 3)?,
        subject: text(row, 4)?,
        body_html: text(row, 5)?,
        body_text: text(row, 6)?,
        ai_generated: flag(row, 7)?,
        status: text(row, 8)?.parse()?,
        is_followup: flag(row, 9)?,
        followup_number: uint(row, 10)?,
        replied_at: opt_ts(row, 11)?,
        created_at: ts(row, 12)?,
    })
}

async fn insert_prospect_rows(
    conn: &Connection,
    project_id: &str,
    org_id: &str,
    prospects: &[NewProspect],
) -> Result<Vec<Prospect>> {
    let now = Utc::now();
    let now_str = now.to_rfc3339();
    let mut created = Vec::with_capacity(prospects.len());

    for p in prospects {
        let id = new_record_id();
        conn.execute(
            "INSERT INTO prospects (id, project_id, org_id, prospect_url, prospect_domain,
                page_title, page_url, snippet, domain_authority, spam_score, opportunity_type,
                linkability_score, relevance_score, status, entry_method, link_live,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 0, ?16, ?17)",
            params![
                id.as_str(),
                project_id,
                org_id,
                p.prospect_url.as_str(),
                p.prospect_domain.as_str(),
                p.page_title.as_deref(),
                p.page_url.as_deref(),
                p.snippet.as_deref(),
                p.domain_authority.map(i64::from),
                p.spam_score.map(i64::from),
                p.opportunity_type.map(|t| t.as_str()),
                p.linkability_score.map(i64::from),
                p.relevance_score.map(i64::from),
                ProspectStatus::Identified.as_str(),
                p.entry_method.as_str(),
                now_str.as_str(),
                now_str.as_str()
            ],
        )
        .await
        .map_err(storage_err)?;

        created.push(Prospect {
            id,
            project_id: project_id.to_string(),
            org_id: org_id.to_string(),
            prospect_url: p.prospect_url.clone(),
            prospect_domain: p.prospect_domain.clone(),
            page_title: p.page_title.clone(),
            page_url: p.page_url.clone(),
            snippet: p.snippet.clone(),
            domain_authority: p.domain_authority,
            spam_score: p.spam_score,
            contact_name: None,
            contact_email: None,
            contact_role: None,
            contact_source: None,
            opportunity_type: p.opportunity_type,
            linkability_score: p.linkability_score,
            relevance_score: p.relevance_score,
            status: ProspectStatus::Identified,
            entry_method: p.entry_method,
            first_contacted_at: None,
            last_contacted_at: None,
            link_live: false,
            link_url: None,
            link_verified_at: None,
            link_lost_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        });
    }
    Ok(created)
}
