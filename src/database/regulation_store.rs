//! Postgres-backed `RegulationStore`
//!
//! Every query casts its columns explicitly so the row types stay stable
//! whether the corpus stores ids as `text`, `varchar` or `uuid`. Node rows
//! come back as `RawNodeRow` and are validated on the way out.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::{debug, warn};

use crate::analytics::NamedCount;
use crate::error::Result;
use crate::models::{
    Agency, ContentChunk, Correction, CorrectionFilter, FlatNode, RawNodeRow, RegulationNode,
    TitleSummary,
};
use crate::navigation::{compare_numbers, compare_siblings, BrowsePath};
use crate::search::{MatchKind, SearchHit, SearchQuery, SectionRef};
use crate::store::RegulationStore;

macro_rules! node_columns {
    ($alias:literal) => {
        concat!(
            $alias, ".id::text AS id, ",
            $alias, ".parent::text AS parent, ",
            $alias, ".level_type::text AS level_type, ",
            $alias, ".number::text AS number, ",
            $alias, ".node_name::text AS node_name, ",
            $alias, ".citation::text AS citation, ",
            $alias, ".link::text AS link, ",
            $alias, ".node_type::text AS node_type, ",
            $alias, ".depth::int4 AS depth, ",
            $alias, ".num_corrections::int4 AS num_corrections, ",
            $alias, ".metadata::jsonb AS metadata"
        )
    };
}

macro_rules! agency_columns {
    () => {
        r#"a.id::text AS id,
           a.name::text AS name,
           a.parent_id::text AS parent_id,
           COALESCE(a.num_sections, 0)::int8 AS num_sections,
           COALESCE(a.num_words, 0)::int8 AS num_words,
           COALESCE(a.num_corrections, 0)::int8 AS num_corrections,
           COALESCE(a.num_children, 0)::int8 AS num_children,
           COALESCE(a.num_cfr, 0)::int8 AS num_cfr"#
    };
}

macro_rules! correction_select {
    () => {
        r#"SELECT c.id::text AS id,
                  c.node_id::text AS node_id,
                  c.agency_id::text AS agency_id,
                  c.title::text AS title,
                  c.error_occurred::date AS error_occurred,
                  c.error_corrected::date AS error_corrected,
                  c.correction_duration::int8 AS correction_duration,
                  n.node_name::text AS node_name,
                  n.citation::text AS citation,
                  n.level_type::text AS level_type,
                  n.number::text AS number,
                  a.name::text AS agency_name
           FROM corrections c"#
    };
}

/// Title number embedded in a node id (`.../title=4/...`)
const TITLE_OF_NODE: &str = "substring(n.id::text from 'title=([^/]+)')";

/// Row shape shared by the exact and full-text lookups
#[derive(Debug, FromRow)]
struct HitRow {
    section_id: String,
    chunk_id: Option<String>,
    content: Option<String>,
    chunk_number: Option<i32>,
    rank: f32,
    level_type: Option<String>,
    number: Option<String>,
    node_name: Option<String>,
    citation: Option<String>,
    parent: Option<String>,
}

impl HitRow {
    fn into_hit(self, match_kind: MatchKind) -> SearchHit {
        SearchHit {
            id: self.section_id.clone(),
            chunk_id: self.chunk_id,
            match_kind,
            content: self.content.unwrap_or_default(),
            chunk_number: self.chunk_number,
            rank: self.rank,
            section: SectionRef {
                id: self.section_id,
                level_type: self.level_type.unwrap_or_default(),
                number: self.number.unwrap_or_default(),
                name: self.node_name.unwrap_or_default(),
                citation: self.citation.unwrap_or_default(),
                parent: self.parent,
            },
        }
    }
}

/// Keep valid rows, log and skip the rest
fn valid_rows<T>(rows: Vec<RawNodeRow>) -> Vec<T>
where
    T: TryFrom<RawNodeRow, Error = crate::error::AnalyzerError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!("Skipping node row: {}", e);
                None
            }
        })
        .collect()
}

fn single_row<T>(row: Option<RawNodeRow>) -> Result<Option<T>>
where
    T: TryFrom<RawNodeRow, Error = crate::error::AnalyzerError>,
{
    row.map(T::try_from).transpose()
}

/// Postgres implementation of the corpus store
#[derive(Clone)]
pub struct PgRegulationStore {
    pool: PgPool,
}

impl PgRegulationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RegulationStore for PgRegulationStore {
    async fn titles(&self) -> Result<Vec<TitleSummary>> {
        let mut titles = sqlx::query_as::<_, TitleSummary>(
            r#"
            SELECT number::text AS number, node_name::text AS node_name
            FROM nodes
            WHERE depth = 0
            ORDER BY number
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        // Text ordering puts "10" before "2"
        titles.sort_by(|a, b| compare_numbers(&a.number, &b.number));
        Ok(titles)
    }

    async fn root_nodes(&self) -> Result<Vec<FlatNode>> {
        let rows = sqlx::query_as::<_, RawNodeRow>(concat!(
            "SELECT ",
            node_columns!("n"),
            " FROM nodes n WHERE n.parent IS NULL"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(valid_rows(rows))
    }

    async fn node(&self, id: &str) -> Result<Option<RegulationNode>> {
        let row = sqlx::query_as::<_, RawNodeRow>(concat!(
            "SELECT ",
            node_columns!("n"),
            " FROM nodes n WHERE n.id::text = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        single_row(row)
    }

    async fn children_of_many(&self, parent_ids: &[String]) -> Result<Vec<FlatNode>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, RawNodeRow>(concat!(
            "SELECT ",
            node_columns!("n"),
            " FROM nodes n WHERE n.parent::text = ANY($1)"
        ))
        .bind(parent_ids)
        .fetch_all(&self.pool)
        .await?;

        debug!(parents = parent_ids.len(), rows = rows.len(), "fetched child level");
        Ok(valid_rows(rows))
    }

    async fn ancestors(&self, id: &str) -> Result<Vec<FlatNode>> {
        // hops bounds the walk if the parent links ever form a loop
        let rows = sqlx::query_as::<_, RawNodeRow>(concat!(
            r#"
            WITH RECURSIVE chain AS (
                SELECT p.*, 1 AS hops
                FROM nodes p
                JOIN nodes child ON child.parent = p.id
                WHERE child.id::text = $1
                UNION ALL
                SELECT p.*, chain.hops + 1
                FROM nodes p
                JOIN chain ON chain.parent = p.id
                WHERE chain.hops < 32
            )
            SELECT "#,
            node_columns!("n"),
            " FROM chain n ORDER BY n.hops DESC"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(valid_rows(rows))
    }

    async fn node_by_path(&self, path: &BrowsePath) -> Result<Option<RegulationNode>> {
        let relative = path.relative();
        if relative.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, RawNodeRow>(concat!(
            "SELECT ",
            node_columns!("n"),
            " FROM get_node_by_path($1) n WHERE n.id IS NOT NULL"
        ))
        .bind(&relative)
        .fetch_optional(&self.pool)
        .await?;

        // The function answers a miss with an all-null row; the filter above
        // turns that into no row at all
        single_row(row)
    }

    async fn child_nodes(&self, id: &str) -> Result<Vec<RegulationNode>> {
        let rows = sqlx::query_as::<_, RawNodeRow>(concat!(
            "SELECT ",
            node_columns!("n"),
            " FROM nodes n WHERE n.parent::text = $1"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut children: Vec<RegulationNode> = valid_rows(rows);
        children.sort_by(|a, b| compare_siblings(&a.flat(), &b.flat()));
        Ok(children)
    }

    async fn content_chunks(&self, section_id: &str) -> Result<Vec<ContentChunk>> {
        let chunks = sqlx::query_as::<_, ContentChunk>(
            r#"
            SELECT id::text AS id,
                   section_id::text AS section_id,
                   content::text AS content,
                   chunk_number::int4 AS chunk_number
            FROM content_chunks
            WHERE section_id::text = $1
            ORDER BY chunk_number
            "#,
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }

    async fn exact_matches(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let citation = query.citation();
        let sql = format!(
            r#"
            SELECT n.id::text AS section_id,
                   NULL::text AS chunk_id,
                   NULL::text AS content,
                   NULL::int4 AS chunk_number,
                   1.0::float4 AS rank,
                   n.level_type::text AS level_type,
                   n.number::text AS number,
                   n.node_name::text AS node_name,
                   n.citation::text AS citation,
                   n.parent::text AS parent
            FROM nodes n
            WHERE CASE
                    WHEN $2::text IS NOT NULL
                        THEN n.number = $2 AND ($3::text IS NULL OR {title} = $3)
                    ELSE lower(n.node_name) = lower($1) OR lower(n.citation) = lower($1)
                  END
              AND (cardinality($4::text[]) = 0 OR {title} = ANY($4))
            LIMIT $5
            "#,
            title = TITLE_OF_NODE
        );

        let rows = sqlx::query_as::<_, HitRow>(&sql)
            .bind(&query.q)
            .bind(citation.as_ref().map(|c| c.number.as_str()))
            .bind(citation.as_ref().and_then(|c| c.title.as_deref()))
            .bind(&query.titles)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|row| row.into_hit(MatchKind::Exact))
            .collect();
        hits.sort_by(|a, b| {
            let flat = |h: &SearchHit| {
                FlatNode::new(
                    h.id.clone(),
                    h.section.parent.as_deref(),
                    h.section.level_type.as_str(),
                    h.section.number.clone(),
                    h.section.name.clone(),
                )
            };
            compare_siblings(&flat(a), &flat(b))
        });
        Ok(hits)
    }

    async fn full_text(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let sql = format!(
            r#"
            SELECT n.id::text AS section_id,
                   c.id::text AS chunk_id,
                   c.content::text AS content,
                   c.chunk_number::int4 AS chunk_number,
                   ts_rank(c.content_tsvector, plainto_tsquery('english', $1))::float4 AS rank,
                   n.level_type::text AS level_type,
                   n.number::text AS number,
                   n.node_name::text AS node_name,
                   n.citation::text AS citation,
                   n.parent::text AS parent
            FROM content_chunks c
            JOIN nodes n ON n.id = c.section_id
            WHERE c.content_tsvector @@ plainto_tsquery('english', $1)
              AND (cardinality($2::text[]) = 0 OR {title} = ANY($2))
            ORDER BY rank DESC, n.id, c.chunk_number
            LIMIT $3
            "#,
            title = TITLE_OF_NODE
        );

        // Several chunks of one section collapse in the merge, so over-fetch
        let fetch_limit = (query.limit * 4) as i64;
        let rows = sqlx::query_as::<_, HitRow>(&sql)
            .bind(&query.q)
            .bind(&query.titles)
            .bind(fetch_limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_hit(MatchKind::FullText))
            .collect())
    }

    async fn root_agencies(&self) -> Result<Vec<Agency>> {
        let agencies = sqlx::query_as::<_, Agency>(concat!(
            "SELECT ",
            agency_columns!(),
            " FROM agencies a WHERE a.parent_id IS NULL ORDER BY a.name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(agencies)
    }

    async fn all_agencies(&self) -> Result<Vec<Agency>> {
        let agencies = sqlx::query_as::<_, Agency>(concat!(
            "SELECT ",
            agency_columns!(),
            " FROM agencies a ORDER BY a.name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(agencies)
    }

    async fn agency(&self, id: &str) -> Result<Option<Agency>> {
        let agency = sqlx::query_as::<_, Agency>(concat!(
            "SELECT ",
            agency_columns!(),
            " FROM agencies a WHERE a.id::text = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(agency)
    }

    async fn child_agencies(&self, id: &str) -> Result<Vec<Agency>> {
        let agencies = sqlx::query_as::<_, Agency>(concat!(
            "SELECT ",
            agency_columns!(),
            " FROM agencies a WHERE a.parent_id::text = $1 ORDER BY a.name"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(agencies)
    }

    async fn agency_nodes(&self, id: &str) -> Result<Vec<RegulationNode>> {
        let rows = sqlx::query_as::<_, RawNodeRow>(concat!(
            "SELECT ",
            node_columns!("n"),
            r#"
            FROM agency_node_mappings m
            JOIN nodes n ON n.id = m.node_id
            WHERE m.agency_id::text = $1
            ORDER BY m.ctid
            "#
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(valid_rows(rows))
    }

    async fn corrections_between(&self, filter: &CorrectionFilter) -> Result<Vec<Correction>> {
        let corrections = sqlx::query_as::<_, Correction>(concat!(
            correction_select!(),
            r#"
            JOIN nodes n ON n.id = c.node_id
            JOIN agencies a ON a.id = c.agency_id
            WHERE c.error_occurred >= $1
              AND c.error_occurred <= $2
              AND (cardinality($3::text[]) = 0 OR c.agency_id::text = ANY($3))
              AND ($4::text IS NULL OR c.title::text = $4)
            ORDER BY c.error_occurred DESC, c.id
            "#
        ))
        .bind(filter.start)
        .bind(filter.end)
        .bind(&filter.agencies)
        .bind(filter.title.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(corrections)
    }

    async fn node_corrections(&self, node_id: &str, limit: usize) -> Result<Vec<Correction>> {
        let corrections = sqlx::query_as::<_, Correction>(concat!(
            correction_select!(),
            r#"
            LEFT JOIN nodes n ON n.id = c.node_id
            LEFT JOIN agencies a ON a.id = c.agency_id
            WHERE c.node_id::text = $1
            ORDER BY c.error_occurred DESC, c.id
            LIMIT $2
            "#
        ))
        .bind(node_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(corrections)
    }

    async fn all_corrections(&self) -> Result<Vec<Correction>> {
        let corrections = sqlx::query_as::<_, Correction>(concat!(
            correction_select!(),
            r#"
            LEFT JOIN nodes n ON n.id = c.node_id
            LEFT JOIN agencies a ON a.id = c.agency_id
            ORDER BY c.error_occurred DESC, c.id
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(corrections)
    }

    async fn top_nodes_by_corrections(&self, limit: usize) -> Result<Vec<NamedCount>> {
        let counts = sqlx::query_as::<_, NamedCount>(
            r#"
            SELECT node_name::text AS name, num_corrections::int8 AS count
            FROM nodes
            WHERE num_corrections IS NOT NULL
            ORDER BY num_corrections DESC, node_name
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}
