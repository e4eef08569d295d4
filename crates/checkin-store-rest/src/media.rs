//! Naming and typing helpers for object-storage uploads.
//!
//! Post media lands in the `posts` bucket under `images/` or
//! `videos/`; avatars in the `avatars` bucket. Stored names are
//! `<unix-millis>_<random>.<ext>` so repeated uploads of the same
//! file never collide.

use checkin_core::store::MediaUpload;
use chrono::Utc;
use rand_core::{OsRng, RngCore};

pub const POSTS_BUCKET: &str = "posts";
pub const AVATARS_BUCKET: &str = "avatars";

/// Which kind of post attachment a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Video,
}

impl MediaKind {
  fn prefix(self) -> &'static str {
    match self {
      MediaKind::Image => "images",
      MediaKind::Video => "videos",
    }
  }
}

/// Build an upload for a post attachment.
pub fn post_upload(
  kind: MediaKind,
  file_name: &str,
  bytes: Vec<u8>,
) -> MediaUpload {
  MediaUpload {
    bucket:       POSTS_BUCKET.to_string(),
    path:         format!("{}/{}", kind.prefix(), stored_name(file_name)),
    content_type: content_type_for(file_name).to_string(),
    bytes,
  }
}

/// Build an upload for a profile avatar.
pub fn avatar_upload(file_name: &str, bytes: Vec<u8>) -> MediaUpload {
  MediaUpload {
    bucket:       AVATARS_BUCKET.to_string(),
    path:         stored_name(file_name),
    content_type: content_type_for(file_name).to_string(),
    bytes,
  }
}

/// `<unix-millis>_<8 base-36 chars>.<ext>` — the original extension is
/// kept, everything else is replaced.
fn stored_name(file_name: &str) -> String {
  let ext = file_name.rsplit('.').next().filter(|e| *e != file_name);
  let stamp = Utc::now().timestamp_millis();
  let suffix = random_suffix(8);
  match ext {
    Some(ext) => format!("{stamp}_{suffix}.{}", ext.to_lowercase()),
    None => format!("{stamp}_{suffix}"),
  }
}

fn random_suffix(len: usize) -> String {
  const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  let mut bytes = vec![0u8; len];
  OsRng.fill_bytes(&mut bytes);
  bytes
    .iter()
    .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
    .collect()
}

/// Content type from the file extension; the storage service only
/// needs it for serving, so unknown extensions fall back to a blob.
pub fn content_type_for(file_name: &str) -> &'static str {
  let ext = file_name.rsplit('.').next().unwrap_or_default().to_lowercase();
  match ext.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "mp4" => "video/mp4",
    "webm" => "video/webm",
    "mov" => "video/quicktime",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn post_uploads_land_under_their_kind() {
    let upload = post_upload(MediaKind::Image, "Lunch.JPG", vec![1, 2, 3]);
    assert_eq!(upload.bucket, "posts");
    assert!(upload.path.starts_with("images/"));
    assert!(upload.path.ends_with(".jpg"));
    assert_eq!(upload.content_type, "image/jpeg");
  }

  #[test]
  fn stored_names_do_not_collide() {
    assert_ne!(stored_name("a.png"), stored_name("a.png"));
  }

  #[test]
  fn unknown_extensions_fall_back_to_octet_stream() {
    assert_eq!(content_type_for("notes.xyz"), "application/octet-stream");
    assert_eq!(content_type_for("no-extension"), "application/octet-stream");
  }
}
