//! Chunk object key parsing.

use crate::result::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// The position of a chunk within its volume's chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    /// The first chunk, carrying the volume header.
    Start,
    /// A chunk between the first and last.
    Intermediate,
    /// The last chunk of the volume.
    End,
}

impl ChunkType {
    /// Maps a chunk role abbreviation to its type.
    pub fn from_abbreviation(abbreviation: char) -> Option<Self> {
        match abbreviation {
            'S' => Some(ChunkType::Start),
            'I' => Some(ChunkType::Intermediate),
            'E' => Some(ChunkType::End),
            _ => None,
        }
    }

    /// The chunk role abbreviation used in object keys.
    pub fn abbreviation(&self) -> char {
        match self {
            ChunkType::Start => 'S',
            ChunkType::Intermediate => 'I',
            ChunkType::End => 'E',
        }
    }
}

/// A parsed chunk object key: `YYYYMMDD-HHMMSS-NNN-{S|I|E}`, where the time
/// is the chunk-set start time and the sequence number is 1-based. The
/// segment positions are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    key: String,
    time: DateTime<Utc>,
    sequence: u32,
    chunk_type: ChunkType,
}

// Segment positions within the key's final component
const TIME_RANGE: std::ops::Range<usize> = 0..15;
const SEQUENCE_RANGE: std::ops::Range<usize> = 16..19;
const TYPE_POSITION: usize = 20;
const NAME_LEN: usize = 21;

impl ChunkKey {
    /// Parses a chunk object key, preserving the exact segment positions of
    /// the name format.
    pub fn parse(key: &str) -> Result<Self> {
        let name = key.rsplit('/').next().unwrap_or(key);

        if name.len() < NAME_LEN {
            return Err(Error::KeyTimeError(key.to_string()));
        }

        let time = NaiveDateTime::parse_from_str(&name[TIME_RANGE], "%Y%m%d-%H%M%S")
            .map_err(|_| Error::KeyTimeError(key.to_string()))?
            .and_utc();

        let sequence: u32 = name[SEQUENCE_RANGE]
            .parse()
            .map_err(|_| Error::KeyTimeError(key.to_string()))?;

        let chunk_type = name
            .chars()
            .nth(TYPE_POSITION)
            .and_then(ChunkType::from_abbreviation)
            .ok_or_else(|| Error::KeyTimeError(key.to_string()))?;

        Ok(Self {
            key: key.to_string(),
            time,
            sequence,
            chunk_type,
        })
    }

    /// The full object key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The chunk-set start time embedded in the key.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// The 1-based sequence number of this chunk within the volume.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The position of this chunk within the volume.
    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_chunk_keys() {
        let key = ChunkKey::parse("KIND/585/20250324-134727-001-S").unwrap();

        assert_eq!(
            key.time(),
            Utc.with_ymd_and_hms(2025, 3, 24, 13, 47, 27).unwrap()
        );
        assert_eq!(key.sequence(), 1);
        assert_eq!(key.chunk_type(), ChunkType::Start);
    }

    #[test]
    fn parses_intermediate_and_end_roles() {
        let key = ChunkKey::parse("KIND/585/20250324-134727-042-I").unwrap();
        assert_eq!(key.sequence(), 42);
        assert_eq!(key.chunk_type(), ChunkType::Intermediate);

        let key = ChunkKey::parse("KIND/585/20250324-134727-055-E").unwrap();
        assert_eq!(key.sequence(), 55);
        assert_eq!(key.chunk_type(), ChunkType::End);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(ChunkKey::parse("KIND/585/20250324-134727-001").is_err());
        assert!(ChunkKey::parse("KIND/585/garbage").is_err());
        assert!(ChunkKey::parse("KIND/585/20250324-134727-001-X").is_err());
        assert!(ChunkKey::parse("").is_err());
    }

    #[test]
    fn abbreviations_round_trip() {
        for chunk_type in [ChunkType::Start, ChunkType::Intermediate, ChunkType::End] {
            assert_eq!(
                ChunkType::from_abbreviation(chunk_type.abbreviation()),
                Some(chunk_type)
            );
        }
    }
}
