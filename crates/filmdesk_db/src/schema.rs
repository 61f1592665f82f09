//! Database schema creation for all FilmDesk tables.
//!
//! All CREATE TABLE statements live here - single source of truth.
//! Timestamps are INTEGER milliseconds (UTC); calendar dates are TEXT `YYYY-MM-DD`;
//! list/map attributes are JSON TEXT.

use crate::error::Result;
use crate::FilmDb;
use tracing::debug;

impl FilmDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        self.create_project_tables().await?;
        self.create_job_tables().await?;
        self.create_grant_tables().await?;
        self.create_festival_tables().await?;
        self.create_production_tables().await?;

        debug!("Database schema verified");
        Ok(())
    }

    async fn exec_all(&self, statements: &[&str]) -> Result<()> {
        for sql in statements {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Projects (match subjects), progress flags and the activity log
    async fn create_project_tables(&self) -> Result<()> {
        self.exec_all(&[
            r#"CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                project_type TEXT NOT NULL,
                stage TEXT NOT NULL,
                genre TEXT NOT NULL,
                genres_json TEXT NOT NULL DEFAULT '[]',
                themes_json TEXT NOT NULL DEFAULT '[]',
                diversity_flags_json TEXT NOT NULL DEFAULT '[]',
                estimated_budget REAL,
                budget_range TEXT NOT NULL,
                location_json TEXT NOT NULL DEFAULT '{}',
                features_json TEXT NOT NULL DEFAULT '[]',
                setup_completed INTEGER NOT NULL DEFAULT 0,
                script_path TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS project_progress (
                project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
                script_analyzed INTEGER NOT NULL DEFAULT 0,
                budget_generated INTEGER NOT NULL DEFAULT 0,
                schedule_generated INTEGER NOT NULL DEFAULT 0,
                grants_matched INTEGER NOT NULL DEFAULT 0,
                festivals_matched INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                action TEXT NOT NULL,
                section TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_activity_project ON activity_log(project_id, created_at)",
        ])
        .await
    }

    /// Agent job queue
    async fn create_job_tables(&self) -> Result<()> {
        // seq breaks created_at ties in insertion order
        self.exec_all(&[
            r#"CREATE TABLE IF NOT EXISTS agent_jobs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                input_params_json TEXT NOT NULL DEFAULT '{}',
                output_data_json TEXT NOT NULL DEFAULT '{}',
                error_message TEXT,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_agent_jobs_claim ON agent_jobs(status, created_at, seq)",
            "CREATE INDEX IF NOT EXISTS idx_agent_jobs_project ON agent_jobs(project_id)",
        ])
        .await
    }

    /// Grants, per-project grant preferences and grant matches
    async fn create_grant_tables(&self) -> Result<()> {
        self.exec_all(&[
            r#"CREATE TABLE IF NOT EXISTS grants (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                organization TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                deadline TEXT NOT NULL,
                amount_min REAL,
                amount_max REAL,
                currency TEXT NOT NULL DEFAULT 'USD',
                grant_type TEXT NOT NULL DEFAULT 'general',
                funding_type TEXT NOT NULL DEFAULT 'grant',
                eligibility_json TEXT NOT NULL DEFAULT '{}',
                location_json TEXT NOT NULL DEFAULT '{}',
                project_types_json TEXT NOT NULL DEFAULT '[]',
                description TEXT NOT NULL DEFAULT '',
                tags_json TEXT NOT NULL DEFAULT '[]',
                source TEXT NOT NULL DEFAULT 'manual',
                scraped_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(title, organization)
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_grants_deadline ON grants(deadline)",
            r#"CREATE TABLE IF NOT EXISTS grant_preferences (
                project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
                preferred_funding_types_json TEXT NOT NULL DEFAULT '[]',
                funding_priorities_json TEXT NOT NULL DEFAULT '[]',
                min_amount REAL,
                max_amount REAL,
                preferred_regions_json TEXT NOT NULL DEFAULT '[]',
                lead_time_days INTEGER NOT NULL DEFAULT 30,
                updated_at INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS grant_matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                grant_id TEXT NOT NULL REFERENCES grants(id) ON DELETE CASCADE,
                score INTEGER NOT NULL,
                quality TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                details_json TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'suggested',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(project_id, grant_id)
            )"#,
        ])
        .await
    }

    /// Festivals, per-project festival preferences and festival matches
    async fn create_festival_tables(&self) -> Result<()> {
        self.exec_all(&[
            r#"CREATE TABLE IF NOT EXISTS festivals (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                website_url TEXT NOT NULL DEFAULT '',
                deadline_early TEXT,
                deadline_regular TEXT,
                deadline_late TEXT,
                fee_early REAL,
                fee_regular REAL,
                fee_late REAL,
                currency TEXT NOT NULL DEFAULT 'USD',
                tier TEXT NOT NULL DEFAULT 'regional',
                genres_json TEXT NOT NULL DEFAULT '[]',
                eligibility_json TEXT NOT NULL DEFAULT '{}',
                awards_json TEXT NOT NULL DEFAULT '[]',
                prestige_score INTEGER NOT NULL DEFAULT 50,
                scraped_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(name, location)
            )"#,
            r#"CREATE TABLE IF NOT EXISTS festival_preferences (
                project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
                preferred_tiers_json TEXT NOT NULL DEFAULT '[]',
                max_entry_fee REAL,
                lead_time_days INTEGER NOT NULL DEFAULT 30,
                updated_at INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS festival_matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                festival_id TEXT NOT NULL REFERENCES festivals(id) ON DELETE CASCADE,
                score INTEGER NOT NULL,
                quality TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                details_json TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'considering',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(project_id, festival_id)
            )"#,
        ])
        .await
    }

    /// Script breakdowns, budgets and schedules produced by agent jobs
    async fn create_production_tables(&self) -> Result<()> {
        self.exec_all(&[
            r#"CREATE TABLE IF NOT EXISTS script_breakdowns (
                project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS scenes (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES script_breakdowns(project_id) ON DELETE CASCADE,
                number INTEGER NOT NULL,
                slug TEXT NOT NULL,
                int_ext TEXT NOT NULL,
                day_night TEXT NOT NULL,
                location TEXT NOT NULL,
                characters_json TEXT NOT NULL DEFAULT '[]',
                est_shoot_hours REAL NOT NULL DEFAULT 1.0,
                complexity TEXT NOT NULL DEFAULT 'simple',
                notes TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                UNIQUE(project_id, number)
            )"#,
            r#"CREATE TABLE IF NOT EXISTS budgets (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                version INTEGER NOT NULL,
                total_budget REAL NOT NULL DEFAULT 0,
                contingency_percent INTEGER NOT NULL DEFAULT 10,
                status TEXT NOT NULL DEFAULT 'draft',
                created_at INTEGER NOT NULL,
                UNIQUE(project_id, version)
            )"#,
            r#"CREATE TABLE IF NOT EXISTS budget_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                budget_id TEXT NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
                category TEXT NOT NULL,
                subcategory TEXT NOT NULL,
                description TEXT NOT NULL,
                quantity REAL NOT NULL DEFAULT 1,
                unit TEXT NOT NULL DEFAULT 'item',
                rate REAL NOT NULL DEFAULT 0,
                total REAL NOT NULL DEFAULT 0,
                order_index INTEGER NOT NULL DEFAULT 0
            )"#,
            r#"CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                version INTEGER NOT NULL,
                total_days INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'draft',
                created_at INTEGER NOT NULL,
                UNIQUE(project_id, version)
            )"#,
            r#"CREATE TABLE IF NOT EXISTS shoot_days (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
                day_number INTEGER NOT NULL,
                location TEXT NOT NULL,
                scenes_json TEXT NOT NULL DEFAULT '[]',
                call_time TEXT,
                notes TEXT NOT NULL DEFAULT '',
                order_index INTEGER NOT NULL DEFAULT 0,
                UNIQUE(schedule_id, day_number)
            )"#,
        ])
        .await
    }
}
