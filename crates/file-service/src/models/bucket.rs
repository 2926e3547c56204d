//! Known buckets and the upload routing rules.

use crate::errors::FileError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    CourseThumbnails,
    CourseVideos,
    ZoomRecordings,
    GeneralFiles,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::CourseThumbnails,
        Bucket::CourseVideos,
        Bucket::ZoomRecordings,
        Bucket::GeneralFiles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::CourseThumbnails => "course-thumbnails",
            Bucket::CourseVideos => "course-videos",
            Bucket::ZoomRecordings => "zoom-recordings",
            Bucket::GeneralFiles => "general-files",
        }
    }

    /// Pick the target bucket for an upload.
    ///
    /// An explicit name wins and must be a known bucket. Otherwise tags are
    /// checked in the order `thumbnail`, `video`, `recording`, then the MIME
    /// major type, then `general-files`.
    pub fn resolve(
        explicit: Option<&str>,
        tags: &[String],
        mime_type: &str,
    ) -> Result<Bucket, FileError> {
        if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
            return name.parse();
        }

        let has_tag = |wanted: &str| tags.iter().any(|t| t == wanted);
        if has_tag("thumbnail") {
            return Ok(Bucket::CourseThumbnails);
        }
        if has_tag("video") {
            return Ok(Bucket::CourseVideos);
        }
        if has_tag("recording") {
            return Ok(Bucket::ZoomRecordings);
        }

        let major = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        Ok(match major.as_str() {
            "image" => Bucket::CourseThumbnails,
            "video" => Bucket::CourseVideos,
            _ => Bucket::GeneralFiles,
        })
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = FileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| FileError::Validation(format!("unknown bucket '{s}'")))
    }
}
