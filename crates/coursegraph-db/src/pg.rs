//! PostgreSQL implementation of the graph store.
//!
//! The property graph is encoded relationally: one table per node label and
//! one table per edge type that carries attributes or can fan out
//! (`TEACHES`, `COVERS`, `ALIGNS_TO`, section→slide links). Tree edges
//! (`HAS_SECTION`, course `HAS_SLIDE`) are foreign-key columns on the child.
//!
//! Every write is `INSERT ... ON CONFLICT (key) DO UPDATE` — merge-on-key,
//! set-on-match — so re-running any pass for the same artifact is
//! idempotent. Writes keyed by disjoint course ids are safe to run
//! concurrently; harmonization runs must be serialized externally.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tracing::debug;

use coursegraph_core::{
    Coverage, CourseMeta, Error, GraphStore, Result, Section, SlideLayout, SlideRecord,
};

/// PostgreSQL-backed graph store.
pub struct PgGraphStore {
    pool: PgPool,
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS courses (
        id            TEXT PRIMARY KEY,
        title         TEXT NOT NULL,
        business_unit TEXT,
        discipline    TEXT,
        level         TEXT,
        duration      TEXT,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS sections (
        id              TEXT PRIMARY KEY,
        course_id       TEXT NOT NULL REFERENCES courses(id),
        title           TEXT NOT NULL,
        level           INT NOT NULL DEFAULT 0,
        parent_id       TEXT NOT NULL,
        start_page      INT NOT NULL DEFAULT 0,
        end_page        INT,
        concept_summary JSONB NOT NULL DEFAULT '[]'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS slides (
        id          TEXT PRIMARY KEY,
        course_id   TEXT NOT NULL REFERENCES courses(id),
        page_number INT NOT NULL,
        text        TEXT NOT NULL DEFAULT '',
        layout      TEXT NOT NULL DEFAULT 'blank',
        elements    JSONB NOT NULL DEFAULT 'null',
        UNIQUE (course_id, page_number)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS concepts (
        name        TEXT PRIMARY KEY,
        description TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS canonical_concepts (
        name        TEXT PRIMARY KEY,
        description TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS teaches (
        slide_id TEXT NOT NULL REFERENCES slides(id),
        concept  TEXT NOT NULL REFERENCES concepts(name),
        salience REAL NOT NULL,
        PRIMARY KEY (slide_id, concept)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS section_slides (
        section_id TEXT NOT NULL REFERENCES sections(id),
        slide_id   TEXT NOT NULL REFERENCES slides(id),
        PRIMARY KEY (section_id, slide_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS covers (
        section_id TEXT NOT NULL REFERENCES sections(id),
        concept    TEXT NOT NULL REFERENCES concepts(name),
        score      REAL NOT NULL,
        frequency  INT NOT NULL,
        PRIMARY KEY (section_id, concept)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS aligns_to (
        concept   TEXT NOT NULL REFERENCES concepts(name),
        canonical TEXT NOT NULL REFERENCES canonical_concepts(name),
        PRIMARY KEY (concept, canonical)
    )"#,
];

impl PgGraphStore {
    /// Create a new PgGraphStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the graph tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        debug!(
            subsystem = "db",
            component = "pg",
            op = "ensure_schema",
            "Graph schema ready"
        );
        Ok(())
    }
}

fn row_to_section(row: &sqlx::postgres::PgRow) -> Result<Section> {
    let summary: JsonValue = row.try_get("concept_summary")?;
    let concept_summary: Vec<String> =
        serde_json::from_value(summary).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(Section {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        title: row.try_get("title")?,
        level: row.try_get::<i32, _>("level")? as u32,
        parent_id: row.try_get("parent_id")?,
        start_page: row.try_get::<i32, _>("start_page")? as u32,
        end_page: row.try_get::<Option<i32>, _>("end_page")?.map(|p| p as u32),
        concept_summary,
    })
}

fn row_to_slide(row: &sqlx::postgres::PgRow) -> Result<SlideRecord> {
    let layout: String = row.try_get("layout")?;
    Ok(SlideRecord {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        page_number: row.try_get::<i32, _>("page_number")? as u32,
        text: row.try_get("text")?,
        layout: SlideLayout::from_tag(&layout),
        elements: row.try_get("elements")?,
    })
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn upsert_course(&self, meta: &CourseMeta) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, title, business_unit, discipline, level, duration)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                business_unit = EXCLUDED.business_unit,
                discipline = EXCLUDED.discipline,
                level = EXCLUDED.level,
                duration = EXCLUDED.duration,
                updated_at = now()
            "#,
        )
        .bind(&meta.id)
        .bind(&meta.title)
        .bind(&meta.business_unit)
        .bind(&meta.discipline)
        .bind(&meta.level)
        .bind(&meta.duration)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_section(&self, section: &Section) -> Result<()> {
        section.validate()?;
        sqlx::query(
            r#"
            INSERT INTO sections (id, course_id, title, level, parent_id, start_page, end_page)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                level = EXCLUDED.level,
                parent_id = EXCLUDED.parent_id,
                start_page = EXCLUDED.start_page,
                end_page = EXCLUDED.end_page
            "#,
        )
        .bind(&section.id)
        .bind(&section.course_id)
        .bind(&section.title)
        .bind(section.level as i32)
        .bind(&section.parent_id)
        .bind(section.start_page as i32)
        .bind(section.end_page.map(|p| p as i32))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_slide(&self, slide: &SlideRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO slides (id, course_id, page_number, text, layout, elements)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                text = EXCLUDED.text,
                layout = EXCLUDED.layout,
                elements = EXCLUDED.elements
            "#,
        )
        .bind(&slide.id)
        .bind(&slide.course_id)
        .bind(slide.page_number as i32)
        .bind(&slide.text)
        .bind(slide.layout.as_tag())
        .bind(&slide.elements)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_concept(&self, name: &str, description: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO concepts (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            "#,
        )
        .bind(name)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_teaches(&self, slide_id: &str, concept: &str, salience: f32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO teaches (slide_id, concept, salience)
            VALUES ($1, $2, $3)
            ON CONFLICT (slide_id, concept) DO UPDATE SET salience = EXCLUDED.salience
            "#,
        )
        .bind(slide_id)
        .bind(concept)
        .bind(salience)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attach_slide_to_section(&self, section_id: &str, slide_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO section_slides (section_id, slide_id)
            VALUES ($1, $2)
            ON CONFLICT (section_id, slide_id) DO NOTHING
            "#,
        )
        .bind(section_id)
        .bind(slide_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_covers(
        &self,
        section_id: &str,
        concept: &str,
        coverage: Coverage,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO covers (section_id, concept, score, frequency)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (section_id, concept) DO UPDATE SET
                score = EXCLUDED.score,
                frequency = EXCLUDED.frequency
            "#,
        )
        .bind(section_id)
        .bind(concept)
        .bind(coverage.score)
        .bind(coverage.frequency as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_concept_summary(&self, section_id: &str, names: &[String]) -> Result<()> {
        let summary =
            serde_json::to_value(names).map_err(|e| Error::Serialization(e.to_string()))?;
        sqlx::query("UPDATE sections SET concept_summary = $2 WHERE id = $1")
            .bind(section_id)
            .bind(summary)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sections_for_course(&self, course_id: &str) -> Result<Vec<Section>> {
        let rows = sqlx::query(
            r#"
            SELECT id, course_id, title, level, parent_id, start_page, end_page, concept_summary
            FROM sections WHERE course_id = $1 ORDER BY id
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_section).collect()
    }

    async fn slides_for_course(&self, course_id: &str) -> Result<Vec<SlideRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, course_id, page_number, text, layout, elements
            FROM slides WHERE course_id = $1 ORDER BY page_number
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_slide).collect()
    }

    async fn teaches_for_slide(&self, slide_id: &str) -> Result<Vec<(String, f32)>> {
        let rows =
            sqlx::query("SELECT concept, salience FROM teaches WHERE slide_id = $1 ORDER BY concept")
                .bind(slide_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|row| Ok((row.try_get("concept")?, row.try_get("salience")?)))
            .collect()
    }

    async fn covers_for_section(&self, section_id: &str) -> Result<Vec<(String, Coverage)>> {
        let rows = sqlx::query(
            "SELECT concept, score, frequency FROM covers WHERE section_id = $1 ORDER BY concept",
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get("concept")?,
                    Coverage {
                        score: row.try_get("score")?,
                        frequency: row.try_get::<i32, _>("frequency")? as u32,
                    },
                ))
            })
            .collect()
    }

    async fn concept_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM concepts ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("name")?))
            .collect()
    }

    async fn unaligned_concept_count(&self) -> Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt FROM concepts c
            WHERE NOT EXISTS (SELECT 1 FROM aligns_to a WHERE a.concept = c.name)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("cnt")? as u64)
    }

    async fn upsert_canonical_concept(&self, name: &str, description: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO canonical_concepts (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            "#,
        )
        .bind(name)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_aligns_to(&self, concept: &str, canonical: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO aligns_to (concept, canonical)
            VALUES ($1, $2)
            ON CONFLICT (concept, canonical) DO NOTHING
            "#,
        )
        .bind(concept)
        .bind(canonical)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn alignments_for_concept(&self, concept: &str) -> Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT canonical FROM aligns_to WHERE concept = $1 ORDER BY canonical")
                .bind(concept)
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("canonical")?))
            .collect()
    }
}
