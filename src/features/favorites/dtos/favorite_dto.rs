use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::core::error::ValidationError;
use crate::features::files::dtos::FileResponseDto;
use crate::shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE, MAX_PAGE_SIZE};
use crate::shared::types::{PaginationMeta, SortDirection};
use crate::shared::validation::EXTENSION_REGEX;

/// Sort keys for the favorites listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteSort {
    #[default]
    FavoritedAt,
    FileName,
    UploadDate,
}

impl FavoriteSort {
    /// Sort column; the direction is appended separately
    pub fn as_sql(&self) -> &'static str {
        match self {
            FavoriteSort::FavoritedAt => "fav.created_at",
            FavoriteSort::FileName => "f.file_name",
            FavoriteSort::UploadDate => "f.created_at",
        }
    }
}

/// Query params for listing favorites
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FavoriteListQuery {
    pub page: Option<i64>,
    /// Page size, 1-100
    pub size: Option<i64>,
    pub sort: Option<FavoriteSort>,
    pub order: Option<SortDirection>,
    /// Case-insensitive match on file name
    pub query: Option<String>,
    /// File extension, with or without the leading dot
    pub extension: Option<String>,
    /// Exact tag name
    pub tag: Option<String>,
}

/// Parsed favorites filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteFilter {
    pub page: i64,
    pub size: i64,
    pub sort: FavoriteSort,
    pub order: SortDirection,
    pub query: Option<String>,
    pub extension: Option<String>,
    pub tag: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TryFrom<FavoriteListQuery> for FavoriteFilter {
    type Error = ValidationError;

    fn try_from(q: FavoriteListQuery) -> Result<Self, Self::Error> {
        let page = q.page.unwrap_or(1);
        if !(1..=MAX_PAGE).contains(&page) {
            return Err(ValidationError::InvalidRequest(format!(
                "page must be between 1 and {}",
                MAX_PAGE
            )));
        }
        let size = q.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(ValidationError::InvalidRequest(format!(
                "size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let extension = match non_blank(q.extension) {
            Some(ext) => {
                let ext = ext.trim_start_matches('.').to_lowercase();
                if !EXTENSION_REGEX.is_match(&ext) {
                    return Err(ValidationError::InvalidRequest(format!(
                        "Invalid extension filter: {}",
                        ext
                    )));
                }
                Some(ext)
            }
            None => None,
        };

        Ok(Self {
            page,
            size,
            sort: q.sort.unwrap_or_default(),
            order: q.order.unwrap_or_default(),
            query: non_blank(q.query),
            extension,
            tag: non_blank(q.tag),
        })
    }
}

/// Response DTO for add/remove favorite
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteResponseDto {
    pub success: bool,
    /// When the file was first favorited; absent after removal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorited_at: Option<DateTime<Utc>>,
}

/// A favorited file with fresh access URLs
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteItemDto {
    #[serde(flatten)]
    pub file: FileResponseDto,
    pub favorited_at: DateTime<Utc>,
    /// Presigned GET URL; empty when issuance failed for this row
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Response DTO for a page of favorites
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteListResponseDto {
    pub favorites: Vec<FavoriteItemDto>,
    pub pagination: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let filter = FavoriteFilter::try_from(FavoriteListQuery::default()).unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.size, DEFAULT_PAGE_SIZE);
        assert_eq!(filter.sort, FavoriteSort::FavoritedAt);
        assert_eq!(filter.order, SortDirection::Desc);
    }

    #[test]
    fn test_extension_is_normalized() {
        let filter = FavoriteFilter::try_from(FavoriteListQuery {
            extension: Some(".JPG".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.extension.as_deref(), Some("jpg"));

        let bad = FavoriteListQuery {
            extension: Some("j p g".to_string()),
            ..Default::default()
        };
        assert!(FavoriteFilter::try_from(bad).is_err());
    }

    #[test]
    fn test_size_is_bounded() {
        let bad = FavoriteListQuery {
            size: Some(101),
            ..Default::default()
        };
        assert!(matches!(
            FavoriteFilter::try_from(bad),
            Err(ValidationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_page_is_bounded() {
        let huge = FavoriteListQuery {
            page: Some(1_000_000_000_000_000_000),
            ..Default::default()
        };
        assert!(matches!(
            FavoriteFilter::try_from(huge),
            Err(ValidationError::InvalidRequest(_))
        ));

        let last = FavoriteListQuery {
            page: Some(MAX_PAGE),
            ..Default::default()
        };
        assert_eq!(FavoriteFilter::try_from(last).unwrap().page, MAX_PAGE);
    }

    #[test]
    fn test_sort_query_values() {
        let sort: FavoriteSort = serde_json::from_str("\"upload_date\"").unwrap();
        assert_eq!(sort, FavoriteSort::UploadDate);
        assert_eq!(sort.as_sql(), "f.created_at");
    }
}
