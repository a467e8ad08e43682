use std::sync::Arc;

use tracing::debug;

use crate::core::config::MediaConfig;
use crate::core::deadline::with_deadline;
use crate::core::error::Result;
use crate::features::files::dtos::{FileFilter, FileListResponseDto, FileResponseDto};
use crate::features::files::models::UserId;
use crate::modules::metadata::{FileQuery, MetadataStore};
use crate::shared::types::{page_offset, PaginationMeta};
use crate::shared::validation::start_of_day;

/// Filtered, sorted and paginated view over a user's live files
pub struct ListingService {
    store: Arc<dyn MetadataStore>,
    config: Arc<MediaConfig>,
}

impl ListingService {
    pub fn new(store: Arc<dyn MetadataStore>, config: Arc<MediaConfig>) -> Self {
        Self { store, config }
    }

    pub async fn list_files(
        &self,
        user_id: UserId,
        filter: FileFilter,
    ) -> Result<FileListResponseDto> {
        with_deadline(self.config.request_timeout, "list_files", async {
            let query = Self::to_query(&filter);
            let (files, total) = self.store.list_files(user_id, &query).await?;

            let ids: Vec<_> = files.iter().map(|f| f.id).collect();
            let mut tags = self.store.load_tags(&ids).await?;

            debug!(
                "Listed {} of {} files for user {}",
                files.len(),
                total,
                user_id
            );

            let files = files
                .into_iter()
                .map(|file| {
                    let file_tags = tags.remove(&file.id).unwrap_or_default();
                    FileResponseDto::from_parts(file, file_tags)
                })
                .collect();

            Ok(FileListResponseDto {
                files,
                pagination: PaginationMeta::new(filter.page, filter.page_size, total),
            })
        })
        .await
    }

    /// Whole-day bounds: `start_date` from midnight, `end_date` up to the next midnight
    fn to_query(filter: &FileFilter) -> FileQuery {
        FileQuery {
            file_type: filter.file_type,
            keyword: filter.keyword.clone(),
            tags: filter.tags.clone(),
            created_from: filter.start_date.map(start_of_day),
            created_before: filter
                .end_date
                .and_then(|d| d.succ_opt())
                .map(start_of_day),
            sort: filter.sort,
            limit: filter.page_size,
            offset: page_offset(filter.page, filter.page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::features::files::dtos::FileSort;
    use crate::features::files::models::FileType;
    use crate::shared::test_helpers::{image_request, upload_request, TestContext};

    async fn seed(ctx: &TestContext, user_id: UserId, name: &str, tags: &[&str]) {
        ctx.upload_service()
            .request_upload(user_id, image_request(name, tags))
            .await
            .unwrap();
    }

    fn names(response: &FileListResponseDto) -> Vec<&str> {
        response.files.iter().map(|f| f.file_name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_tag_filter_is_conjunctive() {
        let ctx = TestContext::new();
        seed(&ctx, 1, "both.jpg", &["a", "b"]).await;
        seed(&ctx, 1, "only-a.jpg", &["a"]).await;
        seed(&ctx, 1, "only-b.jpg", &["b"]).await;

        let response = ctx
            .listing_service()
            .list_files(
                1,
                FileFilter {
                    tags: vec!["a".to_string(), "b".to_string()],
                    ..FileFilter::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(names(&response), vec!["both.jpg"]);
        assert_eq!(response.pagination.total_items, 1);
        let tag_names: Vec<&str> = response.files[0]
            .tags
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(tag_names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_keyword_matches_file_name_or_tag() {
        let ctx = TestContext::new();
        seed(&ctx, 1, "Sunset.jpg", &[]).await;
        seed(&ctx, 1, "img001.jpg", &["sunset-beach"]).await;
        seed(&ctx, 1, "other.jpg", &["city"]).await;

        let response = ctx
            .listing_service()
            .list_files(
                1,
                FileFilter {
                    keyword: Some("SUNSET".to_string()),
                    sort: FileSort::Name,
                    ..FileFilter::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(names(&response), vec!["Sunset.jpg", "img001.jpg"]);
    }

    #[tokio::test]
    async fn test_listing_is_scoped_and_hides_deleted_files() {
        let ctx = TestContext::new();
        seed(&ctx, 1, "keep.jpg", &[]).await;
        seed(&ctx, 2, "someone-else.jpg", &[]).await;
        let doomed = ctx
            .upload_service()
            .request_upload(1, image_request("doomed.jpg", &[]))
            .await
            .unwrap();
        ctx.file_service()
            .delete_file(1, doomed.file_id)
            .await
            .unwrap();

        let response = ctx
            .listing_service()
            .list_files(1, FileFilter::default())
            .await
            .unwrap();

        assert_eq!(names(&response), vec!["keep.jpg"]);
    }

    #[tokio::test]
    async fn test_type_filter_sort_and_pagination() {
        let ctx = TestContext::new();
        let upload = ctx.upload_service();
        for (name, size) in [("small.jpg", 10), ("large.jpg", 3000), ("medium.jpg", 200)] {
            let mut request = upload_request(name, "image/jpeg", FileType::Image, size);
            request.tags = vec![];
            upload.request_upload(1, request).await.unwrap();
        }
        upload
            .request_upload(
                1,
                upload_request("clip.mp4", "video/mp4", FileType::Video, 5000),
            )
            .await
            .unwrap();

        let response = ctx
            .listing_service()
            .list_files(
                1,
                FileFilter {
                    file_type: Some(FileType::Image),
                    sort: FileSort::Size,
                    page: 1,
                    page_size: 2,
                    ..FileFilter::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(names(&response), vec!["large.jpg", "medium.jpg"]);
        assert_eq!(response.pagination.total_items, 3);
        assert_eq!(response.pagination.total_pages, 2);

        let page_two = ctx
            .listing_service()
            .list_files(
                1,
                FileFilter {
                    file_type: Some(FileType::Image),
                    sort: FileSort::Size,
                    page: 2,
                    page_size: 2,
                    ..FileFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(names(&page_two), vec!["small.jpg"]);
    }

    #[tokio::test]
    async fn test_date_bounds_cover_whole_days() {
        let ctx = TestContext::new();
        ctx.store.freeze_clock(Some(
            Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap(),
        ));
        seed(&ctx, 1, "before.jpg", &[]).await;
        ctx.store.freeze_clock(Some(
            Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
        ));
        seed(&ctx, 1, "first.jpg", &[]).await;
        ctx.store.freeze_clock(Some(
            Utc.with_ymd_and_hms(2024, 3, 12, 23, 59, 59).unwrap(),
        ));
        seed(&ctx, 1, "last.jpg", &[]).await;
        ctx.store.freeze_clock(Some(
            Utc.with_ymd_and_hms(2024, 3, 13, 0, 0, 0).unwrap(),
        ));
        seed(&ctx, 1, "after.jpg", &[]).await;

        let response = ctx
            .listing_service()
            .list_files(
                1,
                FileFilter {
                    start_date: NaiveDate::from_ymd_opt(2024, 3, 10),
                    end_date: NaiveDate::from_ymd_opt(2024, 3, 12),
                    sort: FileSort::Oldest,
                    ..FileFilter::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(names(&response), vec!["first.jpg", "last.jpg"]);
    }
}
