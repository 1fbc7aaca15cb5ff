use crate::aws::client::client;
use crate::aws::s3::bucket_list_result::BucketListResult;
use crate::aws::s3::bucket_object::BucketObject;
use crate::aws::s3::BucketObjectField;
use crate::result::Error::{S3ListObjectsDecodingError, S3ListObjectsError};
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use xml::reader::XmlEvent;
use xml::EventReader;

/// Lists objects from a S3 bucket with the specified prefix. A delimiter may
/// be given to group keys into common prefixes (e.g. "/" for directory-style
/// grouping), and a maximum number of keys can limit the response size,
/// otherwise AWS's default (1000) applies.
pub async fn list_objects(
    bucket: &str,
    prefix: &str,
    delimiter: Option<&str>,
    max_keys: Option<usize>,
) -> crate::result::Result<BucketListResult> {
    let mut path = format!("https://{bucket}.s3.amazonaws.com?list-type=2&prefix={prefix}");
    if let Some(delimiter) = delimiter {
        path.push_str(&format!("&delimiter={delimiter}"));
    }
    if let Some(max_keys) = max_keys {
        path.push_str(&format!("&max-keys={max_keys}"));
    }
    debug!("Listing objects in bucket \"{bucket}\" with prefix \"{prefix}\"");

    let response = client()
        .get(&path)
        .send()
        .await
        .map_err(S3ListObjectsError)?;
    trace!("  List objects response status: {}", response.status());

    let body = response.text().await.map_err(S3ListObjectsError)?;
    trace!("  List objects response body length: {}", body.len());

    parse_list_response(&body)
}

/// Parses a ListObjectsV2 XML response body.
pub(crate) fn parse_list_response(body: &str) -> crate::result::Result<BucketListResult> {
    let parser = EventReader::new(body.as_bytes());

    let mut objects = Vec::new();
    let mut common_prefixes = Vec::new();
    let mut truncated = false;
    let mut object: Option<BucketObject> = None;
    let mut in_common_prefixes = false;

    let mut field: Option<BucketObjectField> = None;
    for event in parser {
        match event {
            Ok(XmlEvent::StartElement { name, .. }) => match name.local_name.as_ref() {
                "IsTruncated" => field = Some(BucketObjectField::IsTruncated),
                "Contents" => {
                    object = Some(BucketObject {
                        key: String::new(),
                        last_modified: None,
                        size: 0,
                    });
                }
                "CommonPrefixes" => {
                    in_common_prefixes = true;
                    field = None;
                }
                "Key" => field = Some(BucketObjectField::Key),
                "LastModified" => field = Some(BucketObjectField::LastModified),
                "Size" => field = Some(BucketObjectField::Size),
                // A Prefix element at the top level echoes the request prefix
                "Prefix" if in_common_prefixes => {
                    field = Some(BucketObjectField::CommonPrefix);
                    common_prefixes.push(String::new());
                }
                _ => field = None,
            },
            Ok(XmlEvent::Characters(chars)) => {
                if let Some(field) = field.as_ref() {
                    match field {
                        BucketObjectField::IsTruncated => {
                            truncated = chars == "true";
                            if truncated {
                                trace!("  List objects truncated: {truncated}");
                            }
                            continue;
                        }
                        BucketObjectField::CommonPrefix => {
                            if let Some(prefix) = common_prefixes.last_mut() {
                                prefix.push_str(&chars);
                            }
                            continue;
                        }
                        _ => {}
                    }

                    let item = object.as_mut().ok_or_else(|| {
                        warn!("Expected item for object field: {field:?}");
                        S3ListObjectsDecodingError
                    })?;
                    match field {
                        BucketObjectField::Key => item.key.push_str(&chars),
                        BucketObjectField::LastModified => {
                            item.last_modified = DateTime::parse_from_rfc3339(&chars)
                                .ok()
                                .map(|date_time| date_time.with_timezone(&Utc));
                        }
                        BucketObjectField::Size => {
                            item.size = chars.parse().map_err(|_| {
                                warn!("Error parsing object size: {chars}");
                                S3ListObjectsDecodingError
                            })?;
                        }
                        _ => {}
                    }
                }
            }
            Ok(XmlEvent::EndElement { name }) => match name.local_name.as_str() {
                "Contents" => {
                    if let Some(item) = object.take() {
                        objects.push(item);
                    }
                }
                "CommonPrefixes" => {
                    in_common_prefixes = false;
                    field = None;
                }
                _ => {}
            },
            _ => {}
        }
    }

    trace!(
        "  List objects found: {} objects, {} common prefixes",
        objects.len(),
        common_prefixes.len()
    );

    Ok(BucketListResult {
        truncated,
        objects,
        common_prefixes,
    })
}
