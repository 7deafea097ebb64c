use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{CheckpointStore, Error, ErrorKind};
use crate::conversation::ConversationState;

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

/// A store keeping one JSON document per thread in a directory.
///
/// Documents are replaced atomically, a crash while saving leaves the
/// previous checkpoint in place.
#[derive(Clone, Debug)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `base_path`. The directory is created on
    /// the first save.
    #[inline]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Returns the directory of this store.
    #[inline]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn thread_path(&self, thread_id: &str) -> Result<PathBuf, Error> {
        validate_thread_id(thread_id)?;
        Ok(self.base_path.join(format!("{thread_id}.json")))
    }

    async fn write_atomically(
        &self,
        path: &Path,
        content: &[u8],
    ) -> Result<(), io::Error> {
        fs::create_dir_all(&self.base_path).await?;
        let tmp_path = self.base_path.join(format!(
            ".{}.{}.tmp",
            std::process::id(),
            NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed)
        ));

        let write_result = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, path).await
        }
        .await;

        if write_result.is_err() {
            fs::remove_file(&tmp_path).await.ok();
        }
        write_result
    }
}

/// Rejects ids that can't be used as a file name inside the store.
fn validate_thread_id(thread_id: &str) -> Result<(), Error> {
    let invalid = |reason: &str| {
        Err(Error::new(ErrorKind::InvalidThreadId)
            .with_reason(format!("{reason}: {thread_id:?}")))
    };
    if thread_id.is_empty() {
        return invalid("thread id cannot be empty");
    }
    if thread_id.contains(['/', '\\', '\0']) || thread_id.contains("..") {
        return invalid("thread id contains path characters");
    }
    if thread_id.starts_with('.') {
        return invalid("thread id cannot start with a dot");
    }
    if thread_id.chars().any(char::is_control) {
        return invalid("thread id contains control characters");
    }
    Ok(())
}

#[async_trait]
impl CheckpointStore for FileStore {
    async fn load(&self, thread_id: &str) -> Result<ConversationState, Error> {
        let path = self.thread_path(thread_id)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(ConversationState::new(thread_id));
            }
            Err(err) => return Err(err.into()),
        };
        let mut state: ConversationState = serde_json::from_str(&content)?;
        if state.thread_id != thread_id {
            warn!(
                "checkpoint {} claims to be thread {}",
                path.display(),
                state.thread_id
            );
            state.thread_id = thread_id.to_owned();
        }
        Ok(state)
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
    ) -> Result<(), Error> {
        let path = self.thread_path(thread_id)?;
        let document = ConversationState {
            thread_id: thread_id.to_owned(),
            messages: state.messages.clone(),
        };
        let content = serde_json::to_vec_pretty(&document)?;
        self.write_atomically(&path, &content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lookout_model::ToolCall;
    use serde_json::Map;
    use tempfile::TempDir;

    use super::*;
    use crate::conversation::{AssistantReply, Message};

    fn sample_state(thread_id: &str) -> ConversationState {
        let mut state = ConversationState::new(thread_id);
        state.messages.push(Message::user("What's the weather in Paris?"));
        state.messages.push(
            AssistantReply::ToolRequest {
                content: String::new(),
                calls: vec![ToolCall {
                    id: "call:1".to_owned(),
                    name: "search".to_owned(),
                    arguments: Map::new(),
                }],
            }
            .to_message(),
        );
        state
            .messages
            .push(Message::tool_result("call:1", "15°C, cloudy"));
        state
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("threads"));

        let empty = store.load("t1").await.unwrap();
        assert_eq!(empty, ConversationState::new("t1"));

        let state = sample_state("t1");
        store.save("t1", &state).await.unwrap();
        assert_eq!(store.load("t1").await.unwrap(), state);

        // Saving what was loaded changes nothing.
        let loaded = store.load("t1").await.unwrap();
        store.save("t1", &loaded).await.unwrap();
        assert_eq!(store.load("t1").await.unwrap(), state);

        // A fresh store over the same directory sees the same data.
        let reopened = FileStore::new(store.base_path());
        assert_eq!(reopened.load("t1").await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_no_temp_files_left() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.save("t1", &sample_state("t1")).await.unwrap();
        store.save("t1", &sample_state("t1")).await.unwrap();

        let mut names = vec![];
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, ["t1.json"]);
    }

    #[tokio::test]
    async fn test_invalid_thread_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        for id in ["", "../escape", "a/b", "a\\b", ".hidden", "bell\u{7}"] {
            let err = store.load(id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidThreadId, "{id:?}");
            let err = store.save(id, &sample_state(id)).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidThreadId, "{id:?}");
        }
    }

    #[tokio::test]
    async fn test_corrupted_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        fs::write(dir.path().join("t1.json"), b"{ not json")
            .await
            .unwrap();
        let err = store.load("t1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
