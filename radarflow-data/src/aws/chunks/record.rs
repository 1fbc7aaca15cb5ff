//! Per-volume assembly state for the chunked provider.

use crate::aws::chunks::{ChunkKey, ChunkType};
use crate::result::Result;
use chrono::{DateTime, Utc};
use log::warn;
use radarflow_model::decode::VolumeDecoder;
use radarflow_model::volume::VolumeFile;
use std::sync::Arc;

/// Assembly state for one active volume scan: the object-store prefix
/// identifying its chunk group, the partially-assembled file, the last two
/// chunk modification times (for update-period estimation), the next
/// expected 1-based chunk number, and whether the End chunk has been
/// ingested.
#[derive(Debug, Default)]
pub(crate) struct ChunkedScanRecord {
    pub prefix: String,
    pub file: Option<VolumeFile>,
    pub last_modified: Option<DateTime<Utc>>,
    pub second_last_modified: Option<DateTime<Utc>>,
    pub next_file: u32,
    pub has_all_files: bool,

    /// Previous-volume file used to complete this volume's interrupted
    /// scans, fetched once through the archive provider when no predecessor
    /// chunk volume is assembled.
    pub stitch_base: Option<Arc<VolumeFile>>,
}

impl ChunkedScanRecord {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_file: 1,
            ..Self::default()
        }
    }

    /// Applies one downloaded chunk to the assembly state. The caller is
    /// responsible for only feeding the chunk whose sequence number matches
    /// `next_file`, and for re-indexing the file once a batch of chunks has
    /// been applied.
    pub fn ingest_chunk(
        &mut self,
        decoder: &dyn VolumeDecoder,
        chunk_key: &ChunkKey,
        data: &[u8],
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        match chunk_key.chunk_type() {
            ChunkType::Start => {
                // First chunk carries the volume header
                let mut file = decoder.decode_volume(data)?;
                if file.start_time().is_none() {
                    file.set_start_time(Some(chunk_key.time()));
                }
                self.file = Some(file);
            }
            ChunkType::Intermediate | ChunkType::End => {
                let Some(file) = self.file.as_mut() else {
                    warn!(
                        "Chunk {} arrived before the volume start chunk",
                        chunk_key.key()
                    );
                    return Ok(());
                };
                file.load_ldm_records(decoder, data)?;

                if chunk_key.chunk_type() == ChunkType::End {
                    self.has_all_files = true;
                }
            }
        }

        self.second_last_modified = self.last_modified;
        self.last_modified = last_modified;
        self.next_file += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarflow_model::moment::{GateData, MomentBlock};
    use radarflow_model::product::MomentType;
    use radarflow_model::radial::Radial;
    use radarflow_model::result::Result as ModelResult;
    use radarflow_model::level3::Level3File;

    /// A decoder whose "format" is one radial per byte: the byte value is
    /// the radial's azimuth number.
    struct ByteDecoder;

    fn radial(azimuth_number: u16) -> Radial {
        Radial::new(
            azimuth_number,
            (azimuth_number - 1) as f32 * 0.5,
            1,
            0.5,
            19_723,
            azimuth_number as u32 * 1_000,
            212,
        )
        .with_moment(
            MomentType::Reflectivity,
            MomentBlock::new(2, 0, 250, 2.0, 66.0, 16, GateData::Eight(vec![50, 60])),
        )
    }

    impl VolumeDecoder for ByteDecoder {
        fn decode_volume(&self, data: &[u8]) -> ModelResult<VolumeFile> {
            let mut file = VolumeFile::new("KIND", None);
            for byte in data {
                file.add_radial(radial(*byte as u16));
            }
            Ok(file)
        }

        fn decode_records(&self, data: &[u8]) -> ModelResult<Vec<Radial>> {
            Ok(data.iter().map(|byte| radial(*byte as u16)).collect())
        }

        fn decode_level3(&self, _data: &[u8]) -> ModelResult<Level3File> {
            Err(radarflow_model::result::Error::DecodeFailure(
                "not a level 3 decoder".to_string(),
            ))
        }
    }

    fn key(sequence: u32, role: char) -> ChunkKey {
        ChunkKey::parse(&format!("KIND/585/20250324-134727-{sequence:03}-{role}")).unwrap()
    }

    #[test]
    fn chunks_assemble_in_sequence() {
        let decoder = ByteDecoder;
        let mut record = ChunkedScanRecord::new("KIND/585/");

        let t1 = Utc::now();
        record
            .ingest_chunk(&decoder, &key(1, 'S'), &[1, 2], Some(t1))
            .unwrap();
        assert_eq!(record.next_file, 2);
        assert!(!record.has_all_files);
        assert_eq!(record.file.as_ref().unwrap().scans()[&0].len(), 2);

        let t2 = t1 + chrono::Duration::seconds(8);
        record
            .ingest_chunk(&decoder, &key(2, 'I'), &[3, 4], Some(t2))
            .unwrap();
        assert_eq!(record.next_file, 3);
        assert_eq!(record.file.as_ref().unwrap().scans()[&0].len(), 4);
        assert_eq!(record.last_modified, Some(t2));
        assert_eq!(record.second_last_modified, Some(t1));

        let t3 = t2 + chrono::Duration::seconds(9);
        record
            .ingest_chunk(&decoder, &key(3, 'E'), &[5], Some(t3))
            .unwrap();
        assert!(record.has_all_files);
        assert_eq!(record.file.as_ref().unwrap().scans()[&0].len(), 5);
    }

    #[test]
    fn records_start_expecting_the_first_chunk() {
        let record = ChunkedScanRecord::new("KIND/585/");
        assert_eq!(record.next_file, 1);
        assert!(record.file.is_none());
    }

    #[test]
    fn out_of_order_chunk_before_start_is_ignored() {
        let decoder = ByteDecoder;
        let mut record = ChunkedScanRecord::new("KIND/585/");

        record
            .ingest_chunk(&decoder, &key(2, 'I'), &[3], None)
            .unwrap();
        assert!(record.file.is_none());
    }
}
