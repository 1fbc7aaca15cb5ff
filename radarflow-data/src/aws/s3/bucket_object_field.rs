/// Fields of interest while parsing a list objects response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BucketObjectField {
    IsTruncated,
    Key,
    LastModified,
    Size,
    CommonPrefix,
}
