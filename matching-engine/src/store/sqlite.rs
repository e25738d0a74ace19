use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{ApplicationRecord, Job, JobId, JobStatus, NewJob, Skill, WorkerId};
use crate::error::{MatchingError, Result};
use crate::location::{BoundingBox, Coordinates};
use crate::store::{
    ApplicationStore, JobStore, OpenJobsQuery, SkillCatalog, SkillRecord, StoreStats, TagCount,
    UserProfileStore,
};

const JOB_COLUMNS: &str = "id, title, description, status, created_at, latitude, longitude";

/// SQLite-backed job, profile and application store
///
/// Schema:
/// ```sql
/// CREATE TABLE jobs (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     title TEXT NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status TEXT NOT NULL DEFAULT 'open',
///     created_at TEXT NOT NULL,
///     latitude REAL,
///     longitude REAL
/// );
/// CREATE TABLE job_tags (job_id, position, tag, tag_lower);
/// CREATE TABLE user_skills (id, user_id, skill, experience_years, created_at);
/// CREATE TABLE job_applications (id, job_id, user_id, created_at);
/// ```
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Job row without tags
fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let status: String = row.get(3)?;
    let status = status
        .parse::<JobStatus>()
        .map_err(|e| conversion_error(3, MatchingError::InvalidInput(e)))?;

    let created_at: String = row.get(4)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(4, e))?;

    let latitude: Option<f64> = row.get(5)?;
    let longitude: Option<f64> = row.get(6)?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
        _ => None,
    };

    Ok(Job {
        id: JobId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        tags: Vec::new(),
        status,
        created_at,
        location,
    })
}

/// Escape LIKE wildcards in user input
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl SqliteStore {
    /// Open (or create) the database and make sure the schema exists
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT NOT NULL,
                latitude REAL,
                longitude REAL
            );

            CREATE TABLE IF NOT EXISTS job_tags (
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                tag TEXT NOT NULL,
                tag_lower TEXT NOT NULL,
                PRIMARY KEY (job_id, position)
            );

            CREATE TABLE IF NOT EXISTS user_skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                skill TEXT NOT NULL,
                experience_years INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, skill)
            );

            CREATE TABLE IF NOT EXISTS job_applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, job_id)
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_lat_lng ON jobs(latitude, longitude);
            CREATE INDEX IF NOT EXISTS idx_job_tags_lower ON job_tags(tag_lower);",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MatchingError::Other("database lock poisoned".to_string()))
    }

    fn load_tags(conn: &Connection, jobs: &mut [Job]) -> Result<()> {
        let mut stmt = conn.prepare_cached("SELECT tag FROM job_tags WHERE job_id = ? ORDER BY position")?;
        for job in jobs.iter_mut() {
            job.tags = stmt
                .query_map(params![job.id.0], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
        }
        Ok(())
    }

    fn query_jobs(conn: &Connection, sql: &str, values: Vec<Value>) -> Result<Vec<Job>> {
        let mut stmt = conn.prepare(sql)?;
        let mut jobs = stmt
            .query_map(params_from_iter(values), job_from_row)?
            .collect::<rusqlite::Result<Vec<Job>>>()?;
        Self::load_tags(conn, &mut jobs)?;
        Ok(jobs)
    }

    /// Insert a job with its tags
    pub async fn create_job(&self, job: &NewJob) -> Result<Job> {
        if job.title.trim().is_empty() {
            return Err(MatchingError::InvalidInput("job title is required".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let created_at = job.created_at.unwrap_or_else(Utc::now);

        tx.execute(
            "INSERT INTO jobs (title, description, status, created_at, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.title,
                job.description,
                job.status.as_str(),
                timestamp(created_at),
                job.location.map(|c| c.latitude),
                job.location.map(|c| c.longitude),
            ],
        )?;
        let id = tx.last_insert_rowid();

        for (position, tag) in job.tags.iter().enumerate() {
            tx.execute(
                "INSERT INTO job_tags (job_id, position, tag, tag_lower) VALUES (?1, ?2, ?3, ?4)",
                params![id, position as i64, tag, tag.to_lowercase()],
            )?;
        }
        tx.commit()?;

        tracing::debug!("Created job {} with {} tags", id, job.tags.len());

        let mut rows = Self::query_jobs(
            &conn,
            &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
            vec![Value::Integer(id)],
        )?;
        rows.pop().ok_or(MatchingError::JobNotFound(JobId(id)))
    }

    pub async fn set_job_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.0],
        )?;
        if updated == 0 {
            return Err(MatchingError::JobNotFound(id));
        }
        Ok(())
    }

    /// Add a skill; names are stored lowercased and must be unique per worker
    pub async fn add_skill(&self, worker_id: WorkerId, name: &str, experience_years: u32) -> Result<SkillRecord> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(MatchingError::InvalidInput("skill name is required".to_string()));
        }

        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM user_skills WHERE user_id = ?1 AND skill = ?2",
                params![worker_id.0, name],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(MatchingError::SkillExists(name));
        }

        conn.execute(
            "INSERT INTO user_skills (user_id, skill, experience_years, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![worker_id.0, name, experience_years, timestamp(Utc::now())],
        )?;

        Ok(SkillRecord {
            id: conn.last_insert_rowid(),
            worker_id,
            skill: Skill::new(name, experience_years),
        })
    }

    /// Change years of experience on one of the worker's own skills
    pub async fn update_skill_experience(
        &self,
        worker_id: WorkerId,
        skill_id: i64,
        experience_years: u32,
    ) -> Result<SkillRecord> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE user_skills SET experience_years = ?1 WHERE id = ?2 AND user_id = ?3",
            params![experience_years, skill_id, worker_id.0],
        )?;
        if updated == 0 {
            return Err(MatchingError::SkillNotFound(skill_id));
        }

        let name: String = conn.query_row(
            "SELECT skill FROM user_skills WHERE id = ?",
            params![skill_id],
            |row| row.get(0),
        )?;
        Ok(SkillRecord {
            id: skill_id,
            worker_id,
            skill: Skill::new(name, experience_years),
        })
    }

    pub async fn remove_skill(&self, worker_id: WorkerId, skill_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM user_skills WHERE id = ?1 AND user_id = ?2",
            params![skill_id, worker_id.0],
        )?;
        if deleted == 0 {
            return Err(MatchingError::SkillNotFound(skill_id));
        }
        Ok(())
    }

    /// Record that a worker applied to a job. Returns false if already recorded.
    pub async fn record_application(&self, worker_id: WorkerId, job_id: JobId) -> Result<bool> {
        let conn = self.conn()?;
        let job_exists: Option<i64> = conn
            .query_row("SELECT id FROM jobs WHERE id = ?", params![job_id.0], |row| row.get(0))
            .optional()?;
        if job_exists.is_none() {
            return Err(MatchingError::JobNotFound(job_id));
        }

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO job_applications (job_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![job_id.0, worker_id.0, timestamp(Utc::now())],
        )?;
        Ok(inserted > 0)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<u64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        Ok(StoreStats {
            total_jobs: count("SELECT COUNT(*) FROM jobs")?,
            open_jobs: count("SELECT COUNT(*) FROM jobs WHERE status = 'open'")?,
            workers_with_skills: count("SELECT COUNT(DISTINCT user_id) FROM user_skills")?,
            applications: count("SELECT COUNT(*) FROM job_applications")?,
        })
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn get_open_jobs(&self, query: &OpenJobsQuery) -> Result<Vec<Job>> {
        let mut sql = format!("SELECT {} FROM jobs WHERE status = 'open'", JOB_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if !query.excluding.is_empty() {
            let mut excluded: Vec<i64> = query.excluding.iter().map(|id| id.0).collect();
            excluded.sort_unstable();
            sql.push_str(&format!(" AND id NOT IN ({})", vec!["?"; excluded.len()].join(", ")));
            values.extend(excluded.into_iter().map(Value::Integer));
        }

        if let Some(tags) = &query.tag_filter {
            if tags.is_empty() {
                return Ok(Vec::new());
            }
            let mut tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
            tags.sort();
            sql.push_str(&format!(
                " AND id IN (SELECT job_id FROM job_tags WHERE tag_lower IN ({}))",
                vec!["?"; tags.len()].join(", ")
            ));
            values.extend(tags.into_iter().map(Value::Text));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let conn = self.conn()?;
        Self::query_jobs(&conn, &sql, values)
    }

    async fn get_job(&self, id: JobId) -> Result<Job> {
        let conn = self.conn()?;
        let mut rows = Self::query_jobs(
            &conn,
            &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
            vec![Value::Integer(id.0)],
        )?;
        rows.pop().ok_or(MatchingError::JobNotFound(id))
    }

    async fn get_jobs(&self, ids: &[JobId]) -> Result<Vec<Job>> {
        let unique: HashSet<i64> = ids.iter().map(|id| id.0).collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM jobs WHERE id IN ({}) ORDER BY id",
            JOB_COLUMNS,
            vec!["?"; unique.len()].join(", ")
        );
        let conn = self.conn()?;
        Self::query_jobs(&conn, &sql, unique.into_iter().map(Value::Integer).collect())
    }

    async fn get_open_jobs_within(&self, bounds: &BoundingBox) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs
             WHERE status = 'open'
               AND latitude BETWEEN ?1 AND ?2
               AND longitude BETWEEN ?3 AND ?4
             ORDER BY created_at DESC, id DESC",
            JOB_COLUMNS
        );
        let conn = self.conn()?;
        Self::query_jobs(
            &conn,
            &sql,
            vec![
                Value::Real(bounds.lat_min),
                Value::Real(bounds.lat_max),
                Value::Real(bounds.lng_min),
                Value::Real(bounds.lng_max),
            ],
        )
    }
}

#[async_trait]
impl UserProfileStore for SqliteStore {
    async fn get_skills(&self, worker_id: WorkerId) -> Result<Vec<Skill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT skill, experience_years FROM user_skills WHERE user_id = ? ORDER BY id",
        )?;
        let skills = stmt
            .query_map(params![worker_id.0], |row| {
                let years: i64 = row.get(1)?;
                let years = u32::try_from(years)
                    .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, years))?;
                Ok(Skill::new(row.get::<_, String>(0)?, years))
            })?
            .collect::<rusqlite::Result<Vec<Skill>>>()?;
        Ok(skills)
    }
}

#[async_trait]
impl ApplicationStore for SqliteStore {
    async fn get_applications(&self, worker_id: WorkerId) -> Result<Vec<ApplicationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT job_id FROM job_applications WHERE user_id = ? ORDER BY id")?;
        let applications = stmt
            .query_map(params![worker_id.0], |row| {
                Ok(ApplicationRecord {
                    worker_id,
                    job_id: JobId(row.get(0)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<ApplicationRecord>>>()?;
        Ok(applications)
    }
}

#[async_trait]
impl SkillCatalog for SqliteStore {
    async fn tag_popularity(&self, fragment: &str, limit: usize) -> Result<Vec<TagCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT tag_lower, COUNT(*) AS c FROM job_tags
             WHERE tag_lower LIKE ?1 ESCAPE '\\'
             GROUP BY tag_lower
             ORDER BY c DESC, tag_lower ASC
             LIMIT ?2",
        )?;
        let tags = stmt
            .query_map(params![like_pattern(&fragment.to_lowercase()), limit as i64], |row| {
                Ok(TagCount {
                    tag: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<TagCount>>>()?;
        Ok(tags)
    }

    async fn top_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT tag_lower, COUNT(*) AS c FROM job_tags
             GROUP BY tag_lower
             ORDER BY c DESC, tag_lower ASC
             LIMIT ?",
        )?;
        let tags = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TagCount {
                    tag: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<TagCount>>>()?;
        Ok(tags)
    }
}
