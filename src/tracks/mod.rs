//! Track metadata collaborator interface
//!
//! Track lookup and storage live in an external metadata/CRUD service; the
//! broadcast core only needs to resolve which on-disk file a track id maps
//! to. The service stores audio files under a fixed upload-directory root
//! and records the relative path per track.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// Track record as returned by the metadata service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Track id
    pub id: String,
    /// Audio file path relative to the uploads root
    pub audio_file: String,
}

/// Lookup interface to the external metadata service
pub trait TrackProvider: Send + Sync {
    /// Fetch a track by id; `Ok(None)` when no such track exists.
    fn get_track_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = io::Result<Option<Track>>> + Send;
}

/// Resolve a track's absolute audio source path against the uploads root
pub fn resolve_audio_path(uploads_root: &Path, track: &Track) -> PathBuf {
    uploads_root.join(&track.audio_file)
}
