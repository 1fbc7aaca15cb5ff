//! Minimal anonymous S3 operations: listing objects and downloading object
//! bodies.

mod bucket_list_result;
pub use bucket_list_result::BucketListResult;

mod bucket_object;
pub use bucket_object::BucketObject;

mod bucket_object_field;
pub(crate) use bucket_object_field::BucketObjectField;

mod downloaded_bucket_object;
pub use downloaded_bucket_object::DownloadedBucketObject;

mod list_objects;
pub use list_objects::list_objects;
pub(crate) use list_objects::parse_list_response;

mod download_object;
pub use download_object::download_object;
