//! Postgres-backed metadata store
//!
//! Uses runtime-checked queries; dynamic listing filters are assembled with
//! `QueryBuilder` so every user-supplied value is bound, never interpolated.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{FavoriteQuery, FileQuery, MetadataStore};
use crate::core::error::{AppError, Result};
use crate::features::favorites::models::Favorite;
use crate::features::files::models::{
    CreateFile, FileWithTags, MediaFile, Tag, TagChanges, TagUsage, UrlStatus, UserId,
};
use crate::features::stats::models::{
    ActivityCounts, ActivityKind, CreateActivity, DailyActivity, DailyTag,
};

const FILE_COLUMNS: &str = "f.id, f.user_id, f.file_name, f.storage_key, f.thumbnail_key, \
     f.file_type, f.content_type, f.file_size, f.duration, f.url_status, \
     f.created_at, f.updated_at, f.deleted_at";

/// Convert database error to more specific AppError without leaking SQL details
fn handle_db_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        // Unique constraint violation (PostgreSQL error code 23505)
        if db_err.code() == Some(std::borrow::Cow::Borrowed("23505")) {
            if let Some(constraint) = db_err.constraint() {
                if constraint.contains("storage_key") {
                    return AppError::Conflict("Storage key already in use".to_string());
                }
            }
            return AppError::Conflict("Record already exists".to_string());
        }

        // Foreign key violation (PostgreSQL error code 23503)
        if db_err.code() == Some(std::borrow::Cow::Borrowed("23503")) {
            return AppError::NotFound("Referenced record does not exist".to_string());
        }
    }

    AppError::Database(e)
}

/// Escape LIKE metacharacters and wrap for substring matching
fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like(value))
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(FromRow)]
struct FileTagRow {
    file_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

#[derive(FromRow)]
struct FavoriteFileRow {
    favorited_at: DateTime<Utc>,
    #[sqlx(flatten)]
    file: MediaFile,
}

pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find-or-create keyed on (user_id, name); the no-op update makes
    /// `RETURNING` yield the existing row on conflict
    async fn upsert_tag<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: UserId,
        name: &str,
    ) -> std::result::Result<Tag, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, user_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, user_id, name, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(name)
        .fetch_one(executor)
        .await
    }

    async fn insert_activity<'e, E: PgExecutor<'e>>(
        executor: E,
        entry: &CreateActivity,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (id, user_id, file_id, kind, tag_name)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(entry.user_id)
        .bind(entry.file_id)
        .bind(entry.kind)
        .bind(entry.tag_name.as_deref())
        .execute(executor)
        .await?;
        Ok(())
    }

    fn push_file_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: UserId, query: &FileQuery) {
        qb.push(" WHERE f.user_id = ")
            .push_bind(user_id)
            .push(" AND f.deleted_at IS NULL");

        if let Some(file_type) = query.file_type {
            qb.push(" AND f.file_type = ").push_bind(file_type);
        }

        if let Some(ref keyword) = query.keyword {
            let pattern = contains_pattern(keyword);
            qb.push(" AND (f.file_name ILIKE ")
                .push_bind(pattern.clone())
                .push(
                    " OR EXISTS (SELECT 1 FROM file_tags ft JOIN tags t ON t.id = ft.tag_id \
                     WHERE ft.file_id = f.id AND t.name ILIKE ",
                )
                .push_bind(pattern)
                .push("))");
        }

        // One existence check per requested tag: the file must carry all of them
        for tag in &query.tags {
            qb.push(
                " AND EXISTS (SELECT 1 FROM file_tags ft JOIN tags t ON t.id = ft.tag_id \
                 WHERE ft.file_id = f.id AND t.name = ",
            )
            .push_bind(tag.clone())
            .push(")");
        }

        if let Some(from) = query.created_from {
            qb.push(" AND f.created_at >= ").push_bind(from);
        }
        if let Some(before) = query.created_before {
            qb.push(" AND f.created_at < ").push_bind(before);
        }
    }

    fn push_favorite_filters(
        qb: &mut QueryBuilder<'_, Postgres>,
        user_id: UserId,
        query: &FavoriteQuery,
    ) {
        qb.push(" WHERE fav.user_id = ")
            .push_bind(user_id)
            .push(" AND f.user_id = fav.user_id AND f.deleted_at IS NULL");

        if let Some(ref q) = query.query {
            qb.push(" AND f.file_name ILIKE ")
                .push_bind(contains_pattern(q));
        }
        if let Some(ref ext) = query.extension {
            qb.push(" AND LOWER(f.file_name) LIKE ")
                .push_bind(format!("%.{}", escape_like(ext)));
        }
        if let Some(ref tag) = query.tag {
            qb.push(
                " AND EXISTS (SELECT 1 FROM file_tags ft JOIN tags t ON t.id = ft.tag_id \
                 WHERE ft.file_id = f.id AND t.name = ",
            )
            .push_bind(tag.clone())
            .push(")");
        }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn create_file_with_tags(&self, file: CreateFile) -> Result<FileWithTags> {
        let mut tx = self.pool.begin().await?;

        let mut tags = Vec::with_capacity(file.tag_names.len());
        for name in &file.tag_names {
            let tag = Self::upsert_tag(&mut *tx, file.user_id, name)
                .await
                .map_err(handle_db_error)?;
            Self::insert_activity(
                &mut *tx,
                &CreateActivity {
                    user_id: file.user_id,
                    file_id: Some(file.id),
                    kind: ActivityKind::TagAdd,
                    tag_name: Some(tag.name.clone()),
                },
            )
            .await?;
            tags.push(tag);
        }

        let created = sqlx::query_as::<_, MediaFile>(
            r#"
            INSERT INTO files (id, user_id, file_name, storage_key, thumbnail_key,
                               file_type, content_type, file_size, duration, url_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, user_id, file_name, storage_key, thumbnail_key, file_type,
                      content_type, file_size, duration, url_status,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(file.id)
        .bind(file.user_id)
        .bind(&file.file_name)
        .bind(&file.storage_key)
        .bind(file.thumbnail_key.as_deref())
        .bind(file.file_type)
        .bind(&file.content_type)
        .bind(file.file_size)
        .bind(file.duration)
        .bind(UrlStatus::Issued)
        .fetch_one(&mut *tx)
        .await
        .map_err(handle_db_error)?;

        for tag in &tags {
            sqlx::query("INSERT INTO file_tags (file_id, tag_id) VALUES ($1, $2)")
                .bind(created.id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
        }

        Self::insert_activity(
            &mut *tx,
            &CreateActivity {
                user_id: file.user_id,
                file_id: Some(created.id),
                kind: ActivityKind::Upload,
                tag_name: None,
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            "File metadata saved: id={}, type={}, size={}, tags={}",
            created.id,
            created.file_type,
            created.file_size,
            tags.len()
        );

        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(FileWithTags {
            file: created,
            tags,
        })
    }

    async fn find_file(&self, file_id: Uuid) -> Result<Option<MediaFile>> {
        let query = format!(
            "SELECT {} FROM files f WHERE f.id = $1 AND f.deleted_at IS NULL",
            FILE_COLUMNS
        );
        let file = sqlx::query_as::<_, MediaFile>(&query)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    async fn load_tags(&self, file_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>> {
        if file_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, FileTagRow>(
            r#"
            SELECT ft.file_id, t.id, t.user_id, t.name, t.created_at
            FROM file_tags ft
            JOIN tags t ON t.id = ft.tag_id
            WHERE ft.file_id = ANY($1)
            ORDER BY t.name ASC
            "#,
        )
        .bind(file_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut by_file: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_file.entry(row.file_id).or_default().push(row.tag);
        }
        Ok(by_file)
    }

    async fn set_url_status(&self, file_id: Uuid, status: UrlStatus) -> Result<()> {
        sqlx::query("UPDATE files SET url_status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete_file(&self, file_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_file_tags(
        &self,
        user_id: UserId,
        file_id: Uuid,
        tag_names: &[String],
    ) -> Result<TagChanges> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.user_id, t.name, t.created_at
            FROM file_tags ft
            JOIN tags t ON t.id = ft.tag_id
            WHERE ft.file_id = $1
            ORDER BY t.name ASC
            "#,
        )
        .bind(file_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut changes = TagChanges::default();

        for tag in &current {
            if tag_names.iter().any(|n| n == &tag.name) {
                continue;
            }
            sqlx::query("DELETE FROM file_tags WHERE file_id = $1 AND tag_id = $2")
                .bind(file_id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
            Self::insert_activity(
                &mut *tx,
                &CreateActivity {
                    user_id,
                    file_id: Some(file_id),
                    kind: ActivityKind::TagDel,
                    tag_name: Some(tag.name.clone()),
                },
            )
            .await?;
            changes.removed.push(tag.name.clone());
        }

        for name in tag_names {
            if current.iter().any(|t| &t.name == name) {
                continue;
            }
            let tag = Self::upsert_tag(&mut *tx, user_id, name)
                .await
                .map_err(handle_db_error)?;
            sqlx::query("INSERT INTO file_tags (file_id, tag_id) VALUES ($1, $2)")
                .bind(file_id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
            Self::insert_activity(
                &mut *tx,
                &CreateActivity {
                    user_id,
                    file_id: Some(file_id),
                    kind: ActivityKind::TagAdd,
                    tag_name: Some(tag.name.clone()),
                },
            )
            .await?;
            changes.added.push(tag.name);
        }

        sqlx::query("UPDATE files SET updated_at = NOW() WHERE id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            "Tags replaced on file {}: +{} -{}",
            file_id,
            changes.added.len(),
            changes.removed.len()
        );
        Ok(changes)
    }

    async fn list_tags(&self, user_id: UserId) -> Result<Vec<TagUsage>> {
        let tags = sqlx::query_as::<_, TagUsage>(
            r#"
            SELECT t.id, t.name, t.created_at, COUNT(f.id) AS file_count
            FROM tags t
            LEFT JOIN file_tags ft ON ft.tag_id = t.id
            LEFT JOIN files f ON f.id = ft.file_id AND f.deleted_at IS NULL
            WHERE t.user_id = $1
            GROUP BY t.id, t.name, t.created_at
            ORDER BY t.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn list_files(
        &self,
        user_id: UserId,
        query: &FileQuery,
    ) -> Result<(Vec<MediaFile>, i64)> {
        // Total is computed over the filtered set, before pagination
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM files f");
        Self::push_file_filters(&mut count_qb, user_id, query);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM files f", FILE_COLUMNS));
        Self::push_file_filters(&mut qb, user_id, query);
        qb.push(" ORDER BY ")
            .push(query.sort.as_sql())
            .push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let files = qb
            .build_query_as::<MediaFile>()
            .fetch_all(&self.pool)
            .await?;

        Ok((files, total))
    }

    async fn append_activity(&self, entry: CreateActivity) -> Result<()> {
        Self::insert_activity(&self.pool, &entry).await?;
        Ok(())
    }

    async fn add_favorite(&self, user_id: UserId, file_id: Uuid) -> Result<Favorite> {
        let favorite = sqlx::query_as::<_, Favorite>(
            r#"
            INSERT INTO favorites (id, user_id, file_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, file_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, file_id, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(file_id)
        .fetch_one(&self.pool)
        .await
        .map_err(handle_db_error)?;
        Ok(favorite)
    }

    async fn remove_favorite(&self, user_id: UserId, file_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND file_id = $2")
            .bind(user_id)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_favorites(
        &self,
        user_id: UserId,
        query: &FavoriteQuery,
    ) -> Result<(Vec<(DateTime<Utc>, MediaFile)>, i64)> {
        let mut count_qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM favorites fav JOIN files f ON f.id = fav.file_id",
        );
        Self::push_favorite_filters(&mut count_qb, user_id, query);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT fav.created_at AS favorited_at, {} FROM favorites fav JOIN files f ON f.id = fav.file_id",
            FILE_COLUMNS
        ));
        Self::push_favorite_filters(&mut qb, user_id, query);
        qb.push(" ORDER BY ")
            .push(query.sort.as_sql())
            .push(" ")
            .push(query.order.as_sql())
            .push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows = qb
            .build_query_as::<FavoriteFileRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((
            rows.into_iter()
                .map(|row| (row.favorited_at, row.file))
                .collect(),
            total,
        ))
    }

    async fn storage_used(&self, user_id: UserId) -> Result<i64> {
        let used: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(file_size), 0)::BIGINT
            FROM files
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(used)
    }

    async fn activity_counts(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<ActivityCounts> {
        let counts = sqlx::query_as::<_, ActivityCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE kind = 'upload') AS uploads,
                COUNT(*) FILTER (WHERE kind = 'download') AS downloads,
                COUNT(DISTINCT tag_name) FILTER (WHERE kind = 'tag_add') AS distinct_tags
            FROM activity_logs
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn daily_activity(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DailyActivity>> {
        let rows = sqlx::query_as::<_, DailyActivity>(
            r#"
            SELECT
                (created_at AT TIME ZONE 'UTC')::date AS day,
                COUNT(*) FILTER (WHERE kind = 'upload') AS uploads,
                COUNT(*) FILTER (WHERE kind = 'download') AS downloads
            FROM activity_logs
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn daily_tags(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DailyTag>> {
        let rows = sqlx::query_as::<_, DailyTag>(
            r#"
            SELECT (f.created_at AT TIME ZONE 'UTC')::date AS day, t.name AS name
            FROM files f
            JOIN file_tags ft ON ft.file_id = f.id
            JOIN tags t ON t.id = ft.tag_id
            WHERE f.user_id = $1 AND f.deleted_at IS NULL
              AND f.created_at >= $2 AND f.created_at < $3
            UNION
            SELECT (a.created_at AT TIME ZONE 'UTC')::date AS day, a.tag_name AS name
            FROM activity_logs a
            WHERE a.user_id = $1 AND a.kind = 'tag_add' AND a.tag_name IS NOT NULL
              AND a.created_at >= $2 AND a.created_at < $3
            ORDER BY day, name
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(contains_pattern("trip"), "%trip%");
    }
}
