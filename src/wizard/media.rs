use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// A locally selected file: name, MIME type and raw bytes.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl MediaFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Default)]
struct PreviewLedger {
    issued: u64,
    released: u64,
    live: HashSet<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PreviewStats {
    pub issued: u64,
    pub released: u64,
    pub live: usize,
}

/// Issues preview handles and keeps a ledger of which ones are still live.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    ledger: Arc<Mutex<PreviewLedger>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&self) -> PreviewHandle {
        let id = Uuid::new_v4();
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.issued += 1;
        ledger.live.insert(id);
        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    fn release(&self, id: Uuid) {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        if ledger.live.remove(&id) {
            ledger.released += 1;
        }
    }

    #[cfg(test)]
    pub fn is_live(&self, id: Uuid) -> bool {
        let ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.live.contains(&id)
    }

    pub fn stats(&self) -> PreviewStats {
        let ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        PreviewStats {
            issued: ledger.issued,
            released: ledger.released,
            live: ledger.live.len(),
        }
    }
}

/// Owned preview token. Released exactly once, when dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    #[cfg(test)]
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> String {
        format!("preview:{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[derive(Debug)]
pub struct StagedMedia {
    id: Uuid,
    kind: MediaKind,
    file: MediaFile,
    preview: PreviewHandle,
}

impl StagedMedia {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn file(&self) -> &MediaFile {
        &self.file
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// Photos in display order (index 0 is the thumbnail) plus at most one video.
#[derive(Debug)]
pub struct MediaStagingStore {
    registry: PreviewRegistry,
    photos: Vec<StagedMedia>,
    video: Option<StagedMedia>,
}

impl MediaStagingStore {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            photos: Vec::new(),
            video: None,
        }
    }

    fn stage(&self, file: MediaFile, kind: MediaKind) -> StagedMedia {
        StagedMedia {
            id: Uuid::new_v4(),
            kind,
            file,
            preview: self.registry.issue(),
        }
    }

    pub fn add_photos(&mut self, files: Vec<MediaFile>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let staged = self.stage(file, MediaKind::Image);
            ids.push(staged.id);
            self.photos.push(staged);
        }
        ids
    }

    pub fn remove_photo(&mut self, id: Uuid) -> bool {
        match self.photos.iter().position(|m| m.id == id) {
            Some(index) => {
                self.photos.remove(index);
                true
            }
            None => false,
        }
    }

    /// Moves `from` into the slot currently held by `to`.
    pub fn reorder_photos(&mut self, from: Uuid, to: Uuid) -> bool {
        if from == to {
            return false;
        }
        let (Some(from_index), Some(to_index)) = (
            self.photos.iter().position(|m| m.id == from),
            self.photos.iter().position(|m| m.id == to),
        ) else {
            return false;
        };
        let moved = self.photos.remove(from_index);
        self.photos.insert(to_index, moved);
        true
    }

    pub fn set_video(&mut self, file: Option<MediaFile>) -> Option<Uuid> {
        self.video = file.map(|file| self.stage(file, MediaKind::Video));
        self.video.as_ref().map(|v| v.id)
    }

    pub fn clear(&mut self) {
        self.photos.clear();
        self.video = None;
    }

    pub fn photos(&self) -> &[StagedMedia] {
        &self.photos
    }

    pub fn video(&self) -> Option<&StagedMedia> {
        self.video.as_ref()
    }

    pub fn get(&self, id: Uuid) -> Option<&StagedMedia> {
        self.photos
            .iter()
            .chain(self.video.iter())
            .find(|m| m.id == id)
    }
}
