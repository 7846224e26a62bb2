//! Per-conversation pending image tracking and message dispatch

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::config::Config;
use crate::filter::{self, Direction, Filter, FilterError, FilterParams};
use crate::image::{ImageStore, SavedImage, StorageError};

/// Opaque identifier of a chat
pub type ConversationId = i64;

const FIRST_IMAGE_SAVED: &str = "First image saved successfully! To apply the concatenation \
filter, please send another image or choose a filter from the list to apply a filter.";

/// An inbound image waiting for a second image or a filter command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub path: PathBuf,
}

/// Storage for at most one pending image per conversation
pub trait SessionStore: Send + Sync {
    fn get(&self, id: ConversationId) -> Option<PendingImage>;

    fn put(&self, id: ConversationId, pending: PendingImage);

    /// Remove the entry, returning it if there was one
    fn delete(&self, id: ConversationId) -> Option<PendingImage>;

    /// Remove and return the existing entry, or store `pending` if there is none.
    ///
    /// Stores shared between threads should override this to make it atomic.
    fn take_or_put(&self, id: ConversationId, pending: PendingImage) -> Option<PendingImage> {
        match self.delete(id) {
            Some(existing) => Some(existing),
            None => {
                self.put(id, pending);
                None
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<ConversationId, PendingImage>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: ConversationId) -> Option<PendingImage> {
        self.entries.lock().get(&id).cloned()
    }

    fn put(&self, id: ConversationId, pending: PendingImage) {
        self.entries.lock().insert(id, pending);
    }

    fn delete(&self, id: ConversationId) -> Option<PendingImage> {
        self.entries.lock().remove(&id)
    }

    fn take_or_put(&self, id: ConversationId, pending: PendingImage) -> Option<PendingImage> {
        match self.entries.lock().entry(id) {
            Entry::Occupied(entry) => Some(entry.remove()),
            Entry::Vacant(entry) => {
                entry.insert(pending);
                None
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Please send an image first.")]
    NoImage,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// What the transport should send back to the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Image { path: PathBuf, data: Vec<u8> },
    Text(String),
}

impl From<SavedImage> for Reply {
    fn from(saved: SavedImage) -> Self {
        Reply::Image {
            path: saved.path,
            data: saved.data,
        }
    }
}

/// Greeting listing every filter
pub fn greeting() -> String {
    let mut text = String::from("Hello!\n\nSend me an image and choose a filter:\n");
    for filter in Filter::iter() {
        text.push_str(&format!("- {}: {}\n", filter.name(), filter.description()));
    }
    text.push_str("\nSend two images in a row to concatenate them.");
    text
}

fn unknown_command(text: &str) -> String {
    let names: Vec<_> = Filter::iter().map(|f| f.command()).collect();
    format!(
        "Unknown filter `{}`. Available filters: {}.",
        text.trim(),
        names.join(", ")
    )
}

/// Routes inbound images and commands through the filters.
///
/// A first image is stored as pending; a second image is concatenated with it,
/// and a filter command applies that filter to it. Either way the pending entry
/// is consumed, whether or not the operation succeeds.
pub struct SessionTracker<S = MemorySessionStore> {
    store: S,
    images: ImageStore,
    params: FilterParams,
    direction: Direction,
}

impl SessionTracker<MemorySessionStore> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(MemorySessionStore::new(), config.image_store(), config)
    }
}

impl<S: SessionStore> SessionTracker<S> {
    pub fn new(store: S, images: ImageStore, config: &Config) -> Self {
        Self {
            store,
            images,
            params: config.filters,
            direction: config.concat_direction,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn image_received(&self, id: ConversationId, data: &[u8]) -> Reply {
        let path = match self.images.save_inbound(data) {
            Ok(path) => path,
            Err(e) => {
                // a failed upload also ends any pending pair
                self.store.delete(id);
                log::warn!("[{id}] Error handling image: {e}");
                return Reply::Text(format!("Error handling image: {e}"));
            }
        };

        match self.store.take_or_put(id, PendingImage { path: path.clone() }) {
            None => {
                log::info!("[{id}] First image received");
                Reply::Text(FIRST_IMAGE_SAVED.to_string())
            }
            Some(first) => {
                log::info!("[{id}] Second image received, concatenating");
                match self.concatenate(&first, &path) {
                    Ok(saved) => saved.into(),
                    Err(e) => {
                        log::warn!("[{id}] Error concatenating images: {e}");
                        Reply::Text(format!("Error concatenating images: {e}"))
                    }
                }
            }
        }
    }

    pub fn command_received(&self, id: ConversationId, text: &str) -> Reply {
        let command = text.trim().to_lowercase();
        if command == "/start" || command == "/help" {
            return Reply::Text(greeting());
        }

        let Some(filter) = Filter::from_command(&command) else {
            log::debug!("[{id}] Ignoring unknown command: {command}");
            return Reply::Text(unknown_command(text));
        };

        match self.apply_filter(id, filter) {
            Ok(saved) => saved.into(),
            Err(SessionError::NoImage) => Reply::Text(SessionError::NoImage.to_string()),
            Err(e) => {
                log::warn!("[{id}] Error applying {} filter: {e}", filter.command());
                Reply::Text(format!("Error applying {} filter: {e}", filter.command()))
            }
        }
    }

    fn apply_filter(&self, id: ConversationId, filter: Filter) -> Result<SavedImage, SessionError> {
        let pending = self.store.delete(id).ok_or(SessionError::NoImage)?;

        let img = self.images.load(&pending.path)?;
        let filtered = filter.apply(&img, &self.params, &mut rand::rng())?;

        Ok(self
            .images
            .save_output(&pending.path, &filtered, &filter.suffix())?)
    }

    fn concatenate(
        &self,
        first: &PendingImage,
        second: &std::path::Path,
    ) -> Result<SavedImage, SessionError> {
        let first_img = self.images.load(&first.path)?;
        let second_img = self.images.load(second)?;

        let joined = filter::concat(&first_img, &second_img, self.direction)?;

        Ok(self
            .images
            .save_output(&first.path, &joined, "_concatenated")?)
    }
}
