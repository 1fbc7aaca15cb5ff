//! Process-wide decoder registration.
//!
//! Binary decoding is an external collaborator; the application installs its
//! decoder once at startup and every provider constructed afterwards uses
//! it.

use crate::result::{Error, Result};
use once_cell::sync::OnceCell;
use radarflow_model::decode::VolumeDecoder;
use std::sync::Arc;

static DECODER: OnceCell<Arc<dyn VolumeDecoder>> = OnceCell::new();

/// Installs the process-wide volume decoder. Returns false when a decoder
/// was already installed (the original is kept).
pub fn install_decoder(decoder: Arc<dyn VolumeDecoder>) -> bool {
    DECODER.set(decoder).is_ok()
}

/// The installed volume decoder.
pub fn decoder() -> Result<Arc<dyn VolumeDecoder>> {
    DECODER.get().cloned().ok_or(Error::DecoderNotInstalled)
}
