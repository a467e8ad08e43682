use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::config::MediaConfig;
use crate::core::deadline::with_deadline;
use crate::core::error::Result;
use crate::features::favorites::dtos::{
    FavoriteFilter, FavoriteItemDto, FavoriteListResponseDto, FavoriteResponseDto,
};
use crate::features::favorites::models::FavoriteFile;
use crate::features::files::dtos::FileResponseDto;
use crate::features::files::models::{FileWithTags, UserId};
use crate::features::files::services::load_owned_file;
use crate::modules::metadata::{FavoriteQuery, MetadataStore};
use crate::modules::storage::PresignedUrlIssuer;
use crate::shared::types::{page_offset, PaginationMeta};

/// Service for per-user favorites
pub struct FavoriteService {
    store: Arc<dyn MetadataStore>,
    issuer: Arc<dyn PresignedUrlIssuer>,
    config: Arc<MediaConfig>,
}

impl FavoriteService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        issuer: Arc<dyn PresignedUrlIssuer>,
        config: Arc<MediaConfig>,
    ) -> Self {
        Self {
            store,
            issuer,
            config,
        }
    }

    /// Mark a file as favorite; repeating the call returns the original timestamp
    pub async fn add(&self, user_id: UserId, file_id: Uuid) -> Result<FavoriteResponseDto> {
        with_deadline(self.config.request_timeout, "add_favorite", async {
            let file = load_owned_file(self.store.as_ref(), user_id, file_id).await?;
            let favorite = self.store.add_favorite(user_id, file.id).await?;
            info!("File {} favorited by user {}", file.id, user_id);
            Ok(FavoriteResponseDto {
                success: true,
                favorited_at: Some(favorite.created_at),
            })
        })
        .await
    }

    /// Unmark a file; succeeds whether or not it was a favorite
    pub async fn remove(&self, user_id: UserId, file_id: Uuid) -> Result<FavoriteResponseDto> {
        with_deadline(self.config.request_timeout, "remove_favorite", async {
            self.store.remove_favorite(user_id, file_id).await?;
            debug!("Favorite {} removed for user {}", file_id, user_id);
            Ok(FavoriteResponseDto {
                success: true,
                favorited_at: None,
            })
        })
        .await
    }

    /// Page through favorites, each with fresh download and thumbnail URLs
    pub async fn list(
        &self,
        user_id: UserId,
        filter: FavoriteFilter,
    ) -> Result<FavoriteListResponseDto> {
        with_deadline(self.config.request_timeout, "list_favorites", async {
            let query = FavoriteQuery {
                query: filter.query.clone(),
                extension: filter.extension.clone(),
                tag: filter.tag.clone(),
                sort: filter.sort,
                order: filter.order,
                limit: filter.size,
                offset: page_offset(filter.page, filter.size),
            };
            let (rows, total) = self.store.list_favorites(user_id, &query).await?;

            let ids: Vec<Uuid> = rows.iter().map(|(_, f)| f.id).collect();
            let mut tags = self.store.load_tags(&ids).await?;

            let favorites = rows.into_iter().map(|(favorited_at, file)| {
                let file_tags = tags.remove(&file.id).unwrap_or_default();
                FavoriteFile {
                    favorited_at,
                    file: FileWithTags {
                        file,
                        tags: file_tags,
                    },
                }
            });
            let favorites = join_all(favorites.map(|fav| self.with_urls(fav))).await;

            Ok(FavoriteListResponseDto {
                favorites,
                pagination: PaginationMeta::new(filter.page, filter.size, total),
            })
        })
        .await
    }

    /// URL failures are confined to the row: the URL comes back empty
    async fn with_urls(&self, favorite: FavoriteFile) -> FavoriteItemDto {
        let file = &favorite.file.file;
        let ttl = self.config.download_url_expiry_secs;

        let download_url = self
            .issuer
            .issue_download_url(&file.storage_key, ttl, Some(&file.file_name))
            .await
            .unwrap_or_else(|e| {
                warn!("Download URL for favorite {} failed: {}", file.id, e);
                String::new()
            });

        let thumbnail_url = match &file.thumbnail_key {
            Some(key) => Some(
                self.issuer
                    .issue_download_url(key, ttl, None)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Thumbnail URL for favorite {} failed: {}", file.id, e);
                        String::new()
                    }),
            ),
            None => None,
        };

        FavoriteItemDto {
            file: FileResponseDto::from(favorite.file),
            favorited_at: favorite.favorited_at,
            download_url,
            thumbnail_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::core::error::AppError;
    use crate::features::favorites::dtos::{FavoriteListQuery, FavoriteSort};
    use crate::shared::test_helpers::{image_request, TestContext};
    use crate::shared::types::SortDirection;

    async fn upload(ctx: &TestContext, user_id: UserId, name: &str, tags: &[&str]) -> Uuid {
        ctx.upload_service()
            .request_upload(user_id, image_request(name, tags))
            .await
            .unwrap()
            .file_id
    }

    fn filter(query: FavoriteListQuery) -> FavoriteFilter {
        FavoriteFilter::try_from(query).unwrap()
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let ctx = TestContext::new();
        let file_id = upload(&ctx, 1, "photo.jpg", &[]).await;
        let service = ctx.favorite_service();

        ctx.store
            .freeze_clock(Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()));
        let first = service.add(1, file_id).await.unwrap();
        ctx.store
            .freeze_clock(Some(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()));
        let second = service.add(1, file_id).await.unwrap();

        assert!(second.success);
        assert_eq!(first.favorited_at, second.favorited_at);

        let listed = service
            .list(1, filter(FavoriteListQuery::default()))
            .await
            .unwrap();
        assert_eq!(listed.favorites.len(), 1);
    }

    #[tokio::test]
    async fn test_add_checks_existence_and_ownership() {
        let ctx = TestContext::new();
        let file_id = upload(&ctx, 1, "photo.jpg", &[]).await;
        let service = ctx.favorite_service();

        let err = service.add(2, file_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service.add(1, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let ctx = TestContext::new();
        let file_id = upload(&ctx, 1, "photo.jpg", &[]).await;
        let service = ctx.favorite_service();

        service.add(1, file_id).await.unwrap();
        assert!(service.remove(1, file_id).await.unwrap().success);
        assert!(service.remove(1, file_id).await.unwrap().success);
        assert!(service.remove(1, Uuid::new_v4()).await.unwrap().success);

        let listed = service
            .list(1, filter(FavoriteListQuery::default()))
            .await
            .unwrap();
        assert!(listed.favorites.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_files_drop_out_of_favorites() {
        let ctx = TestContext::new();
        let kept = upload(&ctx, 1, "kept.jpg", &[]).await;
        let gone = upload(&ctx, 1, "gone.jpg", &[]).await;
        let service = ctx.favorite_service();
        service.add(1, kept).await.unwrap();
        service.add(1, gone).await.unwrap();

        ctx.file_service().delete_file(1, gone).await.unwrap();

        let listed = service
            .list(1, filter(FavoriteListQuery::default()))
            .await
            .unwrap();
        assert_eq!(listed.pagination.total_items, 1);
        assert_eq!(listed.favorites[0].file.id, kept);
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let ctx = TestContext::new();
        let a = upload(&ctx, 1, "beta.JPG", &["trip"]).await;
        let b = upload(&ctx, 1, "alpha.jpg", &["trip"]).await;
        let c = upload(&ctx, 1, "alpha.png", &["home"]).await;
        let service = ctx.favorite_service();
        for id in [a, b, c] {
            service.add(1, id).await.unwrap();
        }

        let listed = service
            .list(
                1,
                filter(FavoriteListQuery {
                    extension: Some("jpg".to_string()),
                    tag: Some("trip".to_string()),
                    sort: Some(FavoriteSort::FileName),
                    order: Some(SortDirection::Asc),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let names: Vec<&str> = listed
            .favorites
            .iter()
            .map(|f| f.file.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha.jpg", "beta.JPG"]);

        let by_query = service
            .list(
                1,
                filter(FavoriteListQuery {
                    query: Some("ALPHA".to_string()),
                    size: Some(1),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        assert_eq!(by_query.favorites.len(), 1);
        assert_eq!(by_query.pagination.total_items, 2);
        assert_eq!(by_query.pagination.total_pages, 2);
    }

    #[tokio::test]
    async fn test_url_failure_empties_only_the_url() {
        let ctx = TestContext::new();
        let file_id = upload(&ctx, 1, "photo.jpg", &[]).await;
        let service = ctx.favorite_service();
        service.add(1, file_id).await.unwrap();
        ctx.issuer.fail_downloads(true);

        let listed = service
            .list(1, filter(FavoriteListQuery::default()))
            .await
            .unwrap();

        assert_eq!(listed.favorites.len(), 1);
        assert_eq!(listed.favorites[0].download_url, "");
        assert_eq!(listed.favorites[0].thumbnail_url.as_deref(), Some(""));
    }
}
