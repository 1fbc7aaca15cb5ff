use chrono::{DateTime, Utc};

/// An object listed from an S3 bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketObject {
    /// The object's key within the bucket.
    pub key: String,
    /// When the object was last modified, if reported.
    pub last_modified: Option<DateTime<Utc>>,
    /// The object's size in bytes.
    pub size: u64,
}
