use std::path::Path;

use tracing::{debug, warn};

use crate::error::ServiceError;

const ANSWER_FILE_EXTENSION: &str = "csv";

/// Names of the answer-set files in `dir`, sorted. Contents are never parsed.
pub async fn list_answer_files(dir: &Path) -> Result<Vec<String>, ServiceError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|err| {
        warn!(dir = %dir.display(), error = %err, "failed to open answers library");
        ServiceError::AnswersLibrary(err)
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(ServiceError::AnswersLibrary)?
    {
        let path = entry.path();
        let is_answer_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ANSWER_FILE_EXTENSION));
        if !is_answer_file {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            files.push(name.to_owned());
        }
    }

    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "listed answers library");
    Ok(files)
}
