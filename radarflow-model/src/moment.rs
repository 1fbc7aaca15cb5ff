//! Per-radial moment data blocks: gate metadata, encoding parameters, and raw
//! gate words.

use std::fmt::Debug;

/// Raw gate words for one moment. Dual-polarization moments often use 16-bit
/// words; the base moments use 8-bit words.
#[derive(Clone, PartialEq)]
pub enum GateData {
    /// One byte per gate.
    Eight(Vec<u8>),
    /// One 16-bit word per gate.
    Sixteen(Vec<u16>),
}

impl GateData {
    /// Number of bits per gate word (8 or 16).
    pub fn word_size(&self) -> u8 {
        match self {
            GateData::Eight(_) => 8,
            GateData::Sixteen(_) => 16,
        }
    }

    /// Number of gate words present.
    pub fn len(&self) -> usize {
        match self {
            GateData::Eight(values) => values.len(),
            GateData::Sixteen(values) => values.len(),
        }
    }

    /// Whether no gate words are present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw word at the given gate index, widened to `u16`.
    pub fn value(&self, gate: usize) -> Option<u16> {
        match self {
            GateData::Eight(values) => values.get(gate).map(|value| *value as u16),
            GateData::Sixteen(values) => values.get(gate).copied(),
        }
    }
}

impl Debug for GateData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateData")
            .field("word_size", &self.word_size())
            .field("gates", &self.len())
            .finish()
    }
}

/// Moment data from a radial for a particular product where each raw word
/// corresponds to one range gate.
///
/// Raw words decode to physical values as `(raw - offset) / scale`. Raw word
/// 0 is below the signal threshold and raw word 1 is the range-folded
/// sentinel; any word strictly below the SNR threshold (other than the
/// sentinel) is suppressed from rendering.
#[derive(Clone, PartialEq)]
pub struct MomentBlock {
    gate_count: u16,
    data_moment_range_raw: i32,
    sample_interval_raw: i32,
    scale: f32,
    offset: f32,
    snr_threshold_raw: i16,
    gates: GateData,
}

impl MomentBlock {
    /// Create a new moment data block from its fixed-point encoding.
    pub fn new(
        gate_count: u16,
        data_moment_range_raw: i32,
        sample_interval_raw: i32,
        scale: f32,
        offset: f32,
        snr_threshold_raw: i16,
        gates: GateData,
    ) -> Self {
        Self {
            gate_count,
            data_moment_range_raw,
            sample_interval_raw,
            scale,
            offset,
            snr_threshold_raw,
            gates,
        }
    }

    /// The number of range gates in this data moment.
    pub fn gate_count(&self) -> u16 {
        self.gate_count
    }

    /// The range to the center of the first gate in meters.
    pub fn data_moment_range_raw(&self) -> i32 {
        self.data_moment_range_raw
    }

    /// The range between gate centers in meters.
    pub fn sample_interval_raw(&self) -> i32 {
        self.sample_interval_raw
    }

    /// The scale factor used to decode raw gate words. A value of `0.0` means
    /// raw words are used directly without scaling.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// The offset used to decode raw gate words. The decoded value is
    /// `(raw - offset) / scale`.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// The raw SNR threshold below which gates are considered below noise.
    pub fn snr_threshold_raw(&self) -> i16 {
        self.snr_threshold_raw
    }

    /// Number of bits per gate word (8 or 16).
    pub fn data_word_size(&self) -> u8 {
        self.gates.word_size()
    }

    /// The raw gate words.
    pub fn gates(&self) -> &GateData {
        &self.gates
    }

    /// The raw word at the given gate index, widened to `u16`.
    pub fn raw_value(&self, gate: usize) -> Option<u16> {
        self.gates.value(gate)
    }

    /// The decoded physical value at the given gate index, or `None` for the
    /// below-threshold and range-folded codes.
    pub fn value(&self, gate: usize) -> Option<f32> {
        let raw = self.gates.value(gate)?;

        // scale == 0.0 is an exact comparison; the value comes from a binary
        // format where IEEE 754 zero is stored literally.
        if self.scale == 0.0 {
            return Some(raw as f32);
        }

        match raw {
            0 | 1 => None,
            _ => Some((raw as f32 - self.offset) / self.scale),
        }
    }
}

impl Debug for MomentBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MomentBlock")
            .field("gate_count", &self.gate_count)
            .field("data_moment_range_raw", &self.data_moment_range_raw)
            .field("sample_interval_raw", &self.sample_interval_raw)
            .field("data_word_size", &self.data_word_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(gates: GateData) -> MomentBlock {
        MomentBlock::new(4, 2125, 250, 2.0, 66.0, 16, gates)
    }

    #[test]
    fn raw_values_widen_to_u16() {
        let eight = block(GateData::Eight(vec![0, 1, 100, 200]));
        assert_eq!(eight.raw_value(2), Some(100));
        assert_eq!(eight.data_word_size(), 8);

        let sixteen = block(GateData::Sixteen(vec![0, 1, 1000, 2000]));
        assert_eq!(sixteen.raw_value(3), Some(2000));
        assert_eq!(sixteen.data_word_size(), 16);
    }

    #[test]
    fn decoded_values_apply_scale_and_offset() {
        let block = block(GateData::Eight(vec![0, 1, 100, 200]));

        assert_eq!(block.value(0), None);
        assert_eq!(block.value(1), None);
        assert_eq!(block.value(2), Some((100.0 - 66.0) / 2.0));
        assert_eq!(block.value(4), None);
    }

    #[test]
    fn zero_scale_passes_raw_words_through() {
        let block = MomentBlock::new(2, 0, 250, 0.0, 0.0, 0, GateData::Eight(vec![0, 7]));
        assert_eq!(block.value(0), Some(0.0));
        assert_eq!(block.value(1), Some(7.0));
    }
}
