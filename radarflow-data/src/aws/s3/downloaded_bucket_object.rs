use crate::aws::s3::bucket_object::BucketObject;

/// An object downloaded from an S3 bucket along with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadedBucketObject {
    /// Metadata describing the downloaded object.
    pub metadata: BucketObject,
    /// The object's contents.
    pub data: Vec<u8>,
}
