use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{MediaFile, UserId};
use crate::modules::metadata::MetadataStore;

/// Fetch a live file and check that `user_id` owns it.
///
/// Missing and soft-deleted files are `NotFound`; someone else's file is
/// `Forbidden`. Nothing is written on either path.
pub async fn load_owned_file(
    store: &dyn MetadataStore,
    user_id: UserId,
    file_id: Uuid,
) -> Result<MediaFile> {
    let file = store
        .find_file(file_id)
        .await?
        .ok_or_else(AppError::file_not_found)?;

    if !file.is_owned_by(user_id) {
        return Err(AppError::file_forbidden());
    }

    Ok(file)
}
