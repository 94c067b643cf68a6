//! Postgres adapter for [`Store`]: `pgvector` for
//! `search_vector`, native `tsvector`/GIN for `full_text_index`, `jsonb`
//! for `ai_analysis`/`keywords`/`metadata`.

use crate::error::{ErrorKind, Result, StorageError};
use crate::store::{DocumentPage, Page, ScoredHit, Store, TaxonomyUpsert, TaxonomyUpsertCounts};
use archivist_core::model::{
    AiAnalysis, Document, DocumentFilter, DocumentStatus, SortDirection, SortKey, TaxonomySynonym,
    TaxonomyTerm,
};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

/// `Store` backed by a live Postgres connection pool.
///
/// Pool size should be `>= worker_concurrency + expected HTTP
/// concurrency`; connections are
/// recycled every hour via `PgPoolOptions::max_lifetime`.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .max_lifetime(std::time::Duration::from_secs(3600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::new(ErrorKind::Database, e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document> {
        let status_str: String = row.try_get("status")?;
        let status = parse_status(&status_str)?;
        let ai_analysis_json: Option<serde_json::Value> = row.try_get("ai_analysis")?;
        let ai_analysis = ai_analysis_json
            .map(serde_json::from_value::<AiAnalysis>)
            .transpose()?;
        let keywords_json: serde_json::Value = row.try_get("keywords")?;
        let keywords: Vec<String> = serde_json::from_value(keywords_json).unwrap_or_default();
        let search_vector: Option<pgvector::Vector> = row.try_get("search_vector")?;

        Ok(Document {
            id: row.try_get("id")?,
            filename: row.try_get("filename")?,
            blob_key: row.try_get("blob_key")?,
            size_bytes: row.try_get("size_bytes")?,
            status,
            progress: row.try_get("progress")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            processed_at: row.try_get("processed_at")?,
            extracted_text: row.try_get("extracted_text")?,
            ai_analysis,
            keywords,
            metadata: row.try_get("metadata")?,
            search_vector: search_vector.map(|v| v.to_vec()),
            preview_key: row.try_get("preview_key")?,
            uploaded_by: row.try_get("uploaded_by")?,
        })
    }
}

fn parse_status(s: &str) -> Result<DocumentStatus> {
    match s {
        "PENDING" => Ok(DocumentStatus::Pending),
        "QUEUED" => Ok(DocumentStatus::Queued),
        "PROCESSING" => Ok(DocumentStatus::Processing),
        "COMPLETED" => Ok(DocumentStatus::Completed),
        "FAILED" => Ok(DocumentStatus::Failed),
        other => Err(StorageError::new(
            ErrorKind::Serialization,
            format!("unknown document status in row: {other}"),
        )),
    }
}

fn status_str(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Pending => "PENDING",
        DocumentStatus::Queued => "QUEUED",
        DocumentStatus::Processing => "PROCESSING",
        DocumentStatus::Completed => "COMPLETED",
        DocumentStatus::Failed => "FAILED",
    }
}

fn sort_column(sort_by: SortKey) -> &'static str {
    match sort_by {
        SortKey::Relevance | SortKey::CreatedAt => "created_at",
        SortKey::Filename => "filename",
        SortKey::Size => "size_bytes",
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_document(&self, filename: &str, blob_key: &str, size_bytes: Option<i64>) -> Result<Document> {
        let row = sqlx::query(
            r#"
            insert into documents (filename, blob_key, size_bytes, status, progress)
            values ($1, $2, $3, 'PENDING', 0)
            returning *
            "#,
        )
        .bind(filename)
        .bind(blob_key)
        .bind(size_bytes)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_document(&row)
    }

    async fn get(&self, id: i64) -> Result<Document> {
        let row = sqlx::query("select * from documents where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::document_not_found(id))?;
        Self::row_to_document(&row)
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        progress: Option<i16>,
        error: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let current: String = sqlx::query_scalar("select status from documents where id = $1 for update")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::document_not_found(id))?;
        let current_status = parse_status(&current)?;
        if !current_status.can_transition_to(status) {
            return Err(StorageError::invalid_transition(&current, status_str(status)));
        }

        sqlx::query(
            r#"
            update documents
            set status = $2,
                progress = coalesce($3, progress),
                error = $4,
                processed_at = case when $2 = 'COMPLETED' then now() else processed_at end
            where id = $1
            "#,
        )
        .bind(id)
        .bind(status_str(status))
        .bind(progress)
        .bind(error)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_content(
        &self,
        id: i64,
        extracted_text: &str,
        ai_analysis: &AiAnalysis,
        keywords: &[String],
        metadata: serde_json::Value,
        preview_key: Option<&str>,
    ) -> Result<()> {
        let analysis_json = serde_json::to_value(ai_analysis)?;
        let keywords_json = serde_json::to_value(keywords)?;
        sqlx::query(
            r#"
            update documents
            set extracted_text = $2,
                ai_analysis = $3,
                keywords = $4,
                metadata = $5,
                preview_key = coalesce($6, preview_key)
            where id = $1
            "#,
        )
        .bind(id)
        .bind(extracted_text)
        .bind(analysis_json)
        .bind(keywords_json)
        .bind(metadata)
        .bind(preview_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_embedding(&self, id: i64, vector: &[f32]) -> Result<()> {
        if vector.len() != archivist_core::model::VECTOR_DIM {
            return Err(StorageError::dimension_mismatch(archivist_core::model::VECTOR_DIM, vector.len()));
        }
        let v = pgvector::Vector::from(vector.to_vec());
        sqlx::query("update documents set search_vector = $2 where id = $1")
            .bind(id)
            .bind(v)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_for_reprocessing(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            update documents
            set extracted_text = null,
                ai_analysis = null,
                keywords = '[]'::jsonb,
                search_vector = null,
                status = 'QUEUED',
                progress = 0,
                error = null
            where id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("delete from document_taxonomy_map where document_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("delete from documents where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort_by: SortKey,
        sort_direction: SortDirection,
        page: Page,
    ) -> Result<DocumentPage> {
        let column = sort_column(sort_by);
        let direction = match sort_direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };

        let mut query = sqlx::QueryBuilder::new("select documents.* from documents");
        if filter.canonical_term.is_some() {
            query.push(
                " join document_taxonomy_map on document_taxonomy_map.document_id = documents.id \
                 join taxonomy_terms on taxonomy_terms.id = document_taxonomy_map.term_id",
            );
        }
        query.push(" where 1=1");
        if let Some(status) = filter.status {
            query.push(" and status = ").push_bind(status_str(status));
        }
        if let Some(term) = &filter.canonical_term {
            query.push(" and taxonomy_terms.term = ").push_bind(term.clone());
        }
        if let Some(category) = &filter.primary_category {
            query.push(" and documents.metadata->>'primary_category' = ").push_bind(category.clone());
        }
        if let Some(text) = &filter.free_text {
            query
                .push(" and full_text_index @@ plainto_tsquery('english', ")
                .push_bind(text.clone())
                .push(")");
        }
        query
            .push(format!(" order by documents.{column} {direction} limit "))
            .push_bind(page.per_page as i64)
            .push(" offset ")
            .push_bind(page.offset() as i64);

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            documents.push(Self::row_to_document(row)?);
        }

        let total: i64 = sqlx::query_scalar("select count(*) from documents where ($1::text is null or status = $1)")
            .bind(filter.status.map(status_str))
            .fetch_one(&self.pool)
            .await?;

        Ok(DocumentPage {
            rows: documents,
            total: total as u64,
        })
    }

    async fn vector_search(&self, query_vec: &[f32], k: u32, filter: &DocumentFilter) -> Result<Vec<ScoredHit>> {
        let v = pgvector::Vector::from(query_vec.to_vec());
        let status_filter = filter.status.map(status_str);
        let rows = sqlx::query(
            r#"
            select id, 1 - (search_vector <=> $1) as score
            from documents
            where search_vector is not null
              and ($2::text is null or status = $2)
            order by search_vector <=> $1
            limit $3
            "#,
        )
        .bind(v)
        .bind(status_filter)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ScoredHit {
                    document_id: row.try_get("id")?,
                    score: row.try_get("score")?,
                })
            })
            .collect()
    }

    async fn fulltext_search(&self, query_text: &str, filter: &DocumentFilter) -> Result<Vec<ScoredHit>> {
        let status_filter = filter.status.map(status_str);
        let rows = sqlx::query(
            r#"
            select id, ts_rank(full_text_index, plainto_tsquery('english', $1)) as score
            from documents
            where full_text_index @@ plainto_tsquery('english', $1)
              and ($2::text is null or status = $2)
            order by score desc
            limit 100
            "#,
        )
        .bind(query_text)
        .bind(status_filter)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ScoredHit {
                    document_id: row.try_get("id")?,
                    score: row.try_get("score")?,
                })
            })
            .collect()
    }

    async fn taxonomy_bulk_upsert(&self, upserts: &[TaxonomyUpsert]) -> Result<TaxonomyUpsertCounts> {
        let mut counts = TaxonomyUpsertCounts::default();
        let mut tx = self.pool.begin().await?;
        for upsert in upserts {
            let existing: Option<i64> = sqlx::query_scalar("select id from taxonomy_terms where term = $1")
                .bind(&upsert.term.term)
                .fetch_optional(&mut *tx)
                .await?;

            let term_id = if let Some(id) = existing {
                sqlx::query(
                    "update taxonomy_terms set primary_category = $2, subcategory = $3, description = $4 where id = $1",
                )
                .bind(id)
                .bind(&upsert.term.primary_category)
                .bind(&upsert.term.subcategory)
                .bind(&upsert.term.description)
                .execute(&mut *tx)
                .await?;
                counts.terms_updated += 1;
                id
            } else {
                let id: i64 = sqlx::query_scalar(
                    "insert into taxonomy_terms (term, primary_category, subcategory, description) values ($1, $2, $3, $4) returning id",
                )
                .bind(&upsert.term.term)
                .bind(&upsert.term.primary_category)
                .bind(&upsert.term.subcategory)
                .bind(&upsert.term.description)
                .fetch_one(&mut *tx)
                .await?;
                counts.terms_created += 1;
                id
            };

            for synonym in &upsert.synonyms {
                let inserted = sqlx::query(
                    "insert into taxonomy_synonyms (term_id, synonym) values ($1, $2) on conflict (term_id, synonym) do nothing",
                )
                .bind(term_id)
                .bind(synonym)
                .execute(&mut *tx)
                .await?;
                if inserted.rows_affected() > 0 {
                    counts.synonyms_created += 1;
                }
            }
        }
        tx.commit().await?;
        Ok(counts)
    }

    async fn get_term(&self, id: i64) -> Result<TaxonomyTerm> {
        let row = sqlx::query("select * from taxonomy_terms where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::term_not_found(id.to_string()))?;
        Ok(TaxonomyTerm {
            id: row.try_get("id")?,
            term: row.try_get("term")?,
            primary_category: row.try_get("primary_category")?,
            subcategory: row.try_get("subcategory")?,
            description: row.try_get("description")?,
            parent_id: row.try_get("parent_id")?,
        })
    }

    async fn find_term_by_name(&self, term: &str) -> Result<Option<TaxonomyTerm>> {
        let row = sqlx::query("select * from taxonomy_terms where lower(term) = lower($1)")
            .bind(term)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(TaxonomyTerm {
                id: row.try_get("id")?,
                term: row.try_get("term")?,
                primary_category: row.try_get("primary_category")?,
                subcategory: row.try_get("subcategory")?,
                description: row.try_get("description")?,
                parent_id: row.try_get("parent_id")?,
            })
        })
        .transpose()
    }

    async fn list_terms(&self) -> Result<Vec<TaxonomyTerm>> {
        let rows = sqlx::query("select * from taxonomy_terms order by term").fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(TaxonomyTerm {
                    id: row.try_get("id")?,
                    term: row.try_get("term")?,
                    primary_category: row.try_get("primary_category")?,
                    subcategory: row.try_get("subcategory")?,
                    description: row.try_get("description")?,
                    parent_id: row.try_get("parent_id")?,
                })
            })
            .collect()
    }

    async fn list_synonyms(&self) -> Result<Vec<TaxonomySynonym>> {
        let rows = sqlx::query("select * from taxonomy_synonyms").fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(TaxonomySynonym {
                    id: row.try_get("id")?,
                    term_id: row.try_get("term_id")?,
                    synonym: row.try_get("synonym")?,
                })
            })
            .collect()
    }

    async fn set_document_terms(&self, document_id: i64, term_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("delete from document_taxonomy_map where document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        for term_id in term_ids {
            sqlx::query("insert into document_taxonomy_map (document_id, term_id) values ($1, $2)")
                .bind(document_id)
                .bind(term_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn document_term_ids(&self, document_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("select term_id from document_taxonomy_map where document_id = $1")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn log_search_query(&self, query_text: &str, actor_id: Option<&str>) -> Result<()> {
        sqlx::query("insert into search_queries (query_text, actor_id) values ($1, $2)")
            .bind(query_text)
            .bind(actor_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn top_queries(&self, limit: u32, days: u32) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            select query_text, count(*) as cnt
            from search_queries
            where at > now() - ($1 || ' days')::interval
            group by query_text
            order by cnt desc
            limit $2
            "#,
        )
        .bind(days.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(q, c)| (q, c as u64)).collect())
    }

    async fn find_stuck_documents(&self, older_than_s: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            select id from documents
            where status in ('PENDING', 'QUEUED')
              and updated_at < now() - ($1 || ' seconds')::interval
            "#,
        )
        .bind(older_than_s.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
