//! The Level-2 product view: glues a radar product manager to the sweep
//! pipeline for one product, tracking the selected elevation and time,
//! change detection, and the color-table lookup table.

use crate::color::{ColorTable, Rgba};
use crate::result::{Error, Result};
use crate::sweep::{SweepBuffers, SweepComputer, SweepOptions};
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use radarflow_manager::RadarProductManager;
use radarflow_model::moment::MomentBlock;
use radarflow_model::product::Level2Product;
use radarflow_model::scan::ElevationScan;
use radarflow_model::RANGE_FOLDED;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The raw-word range baked into the color lookup table for each product.
fn lut_range(product: Level2Product) -> (u16, u16) {
    match product {
        Level2Product::DifferentialReflectivity => (1, 1058),
        Level2Product::DifferentialPhase => (1, 1023),
        Level2Product::ClutterFilterPowerRemoved => (1, 81),
        _ => (1, 255),
    }
}

#[derive(Default)]
struct ViewState {
    product: Option<Level2Product>,
    selected_elevation: f32,
    selected_time: Option<DateTime<Utc>>,

    smoothing_enabled: bool,
    show_smoothed_range_folding: bool,
    last_smoothing_enabled: bool,
    last_show_smoothed_range_folding: bool,

    elevation_scan: Option<Arc<ElevationScan>>,
    moment0: Option<MomentBlock>,
    elevation_cut: f32,
    elevation_cuts: Vec<f32>,

    computer: SweepComputer,
    sweep: Option<Arc<SweepBuffers>>,

    color_table: Option<Arc<ColorTable>>,
    lut: Vec<Rgba>,
    lut_min: u16,
    lut_max: u16,
    saved_color_table: Option<Arc<ColorTable>>,
    saved_scale: f32,
    saved_offset: f32,
}

/// A per-product sweep view over one radar site's data. Sweep computation
/// is serialized by the view's internal lock; the renderer reads the latest
/// buffers through [`Level2ProductView::sweep`].
pub struct Level2ProductView {
    manager: Arc<RadarProductManager>,
    state: Mutex<ViewState>,
}

impl Level2ProductView {
    /// Creates a view for the given product over the given site manager.
    pub fn new(product: Level2Product, manager: Arc<RadarProductManager>) -> Self {
        Self {
            manager,
            state: Mutex::new(ViewState {
                product: Some(product),
                ..ViewState::default()
            }),
        }
    }

    /// The manager this view queries.
    pub fn radar_product_manager(&self) -> &Arc<RadarProductManager> {
        &self.manager
    }

    /// Selects the product by its conventional short name (e.g. "REF").
    /// Unknown names invalidate the view until a valid product is selected.
    pub async fn select_product(&self, product_name: &str) {
        let product = Level2Product::from_name(product_name);
        if product.is_none() {
            warn!("Unknown product: \"{product_name}\"");
        }

        self.state.lock().await.product = product;
    }

    /// Selects the elevation angle to sweep.
    pub async fn select_elevation(&self, elevation: f32) {
        self.state.lock().await.selected_elevation = elevation;
    }

    /// Selects the scan time to sweep, or live data when `None`.
    pub async fn select_time(&self, time: Option<DateTime<Utc>>) {
        self.state.lock().await.selected_time = time;
    }

    /// Enables or disables smoothing.
    pub async fn set_smoothing_enabled(&self, enabled: bool) {
        self.state.lock().await.smoothing_enabled = enabled;
    }

    /// Chooses whether range-folded codes survive smoothing.
    pub async fn set_show_smoothed_range_folding(&self, show: bool) {
        self.state.lock().await.show_smoothed_range_folding = show;
    }

    /// Loads a color table for this view and refreshes the lookup table.
    pub async fn load_color_table(&self, color_table: Arc<ColorTable>) {
        let mut state = self.state.lock().await;
        state.color_table = Some(color_table);
        if let Some(product) = state.product {
            update_color_table_lut(&mut state, product);
        }
    }

    /// The most recently computed sweep buffers.
    pub async fn sweep(&self) -> Option<Arc<SweepBuffers>> {
        self.state.lock().await.sweep.clone()
    }

    /// The elevation cut of the most recent sweep.
    pub async fn elevation(&self) -> f32 {
        self.state.lock().await.elevation_cut
    }

    /// All elevation cuts available in the most recent sweep's source file.
    pub async fn elevation_cuts(&self) -> Vec<f32> {
        self.state.lock().await.elevation_cuts.clone()
    }

    /// The color lookup table, with its raw-word bounds, if one has been
    /// baked.
    pub async fn color_table_lut(&self) -> Option<(Vec<Rgba>, u16, u16)> {
        let state = self.state.lock().await;
        if state.lut.is_empty() {
            None
        } else {
            Some((state.lut.clone(), state.lut_min, state.lut_max))
        }
    }

    /// Computes the sweep for the current selection. Returns the computed
    /// buffers, or the reason no new sweep was produced; previously computed
    /// buffers remain available either way.
    pub async fn compute_sweep(&self) -> Result<Arc<SweepBuffers>> {
        trace!("ComputeSweep()");

        let mut state = self.state.lock().await;

        let Some(product) = state.product else {
            return Err(Error::InvalidProduct);
        };
        let moment_type = product.moment_type();

        let smoothing_enabled = state.smoothing_enabled;
        let show_smoothed_range_folding = state.show_smoothed_range_folding;

        let (selection, _status) = self
            .manager
            .get_level2_data(moment_type, state.selected_elevation, state.selected_time)
            .await;

        let Some(selection) = selection else {
            return Err(Error::NotLoaded);
        };

        if let Some(previous) = &state.elevation_scan {
            if Arc::ptr_eq(previous, &selection.scan)
                && smoothing_enabled == state.last_smoothing_enabled
                && (show_smoothed_range_folding == state.last_show_smoothed_range_folding
                    || !smoothing_enabled)
            {
                return Err(Error::NoChange);
            }
        }

        state.last_smoothing_enabled = smoothing_enabled;
        state.last_show_smoothed_range_folding = show_smoothed_range_folding;

        debug!("Computing Sweep");

        let options = SweepOptions {
            smoothing_enabled,
            show_smoothed_range_folding,
        };
        let site = Arc::clone(self.manager.radar_site());

        let buffers = state
            .computer
            .compute(&selection.scan, moment_type, &site, options)?;

        state.moment0 = selection
            .scan
            .first_radial()
            .and_then(|radial| radial.moment_block(moment_type).cloned());
        state.elevation_scan = Some(Arc::clone(&selection.scan));
        state.elevation_cut = selection.elevation_cut;
        state.elevation_cuts = selection.elevation_cuts;

        update_color_table_lut(&mut state, product);

        let sweep = Arc::new(buffers);
        state.sweep = Some(Arc::clone(&sweep));

        Ok(sweep)
    }
}

/// Rebuilds the raw-word color lookup table when the palette, scale, or
/// offset changed. Entry `RANGE_FOLDED` takes the palette's reserved
/// range-folded color.
fn update_color_table_lut(state: &mut ViewState, product: Level2Product) {
    let Some(moment0) = &state.moment0 else {
        // Nothing to update
        return;
    };
    let Some(color_table) = state.color_table.clone() else {
        return;
    };
    if !color_table.is_valid() {
        return;
    }

    let offset = moment0.offset();
    let scale = moment0.scale();

    let unchanged = state
        .saved_color_table
        .as_ref()
        .map_or(false, |saved| Arc::ptr_eq(saved, &color_table))
        && state.saved_offset == offset
        && state.saved_scale == scale;
    if unchanged {
        return;
    }

    let (range_min, range_max) = lut_range(product);

    state.lut = (range_min..=range_max)
        .map(|raw| {
            if raw == RANGE_FOLDED {
                color_table.rf_color()
            } else {
                color_table.color((raw as f32 - offset) / scale)
            }
        })
        .collect();
    state.lut_min = range_min;
    state.lut_max = range_max;

    state.saved_color_table = Some(color_table);
    state.saved_offset = offset;
    state.saved_scale = scale;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lut_ranges_cover_product_word_widths() {
        assert_eq!(lut_range(Level2Product::Reflectivity), (1, 255));
        assert_eq!(lut_range(Level2Product::CorrelationCoefficient), (1, 255));
        assert_eq!(lut_range(Level2Product::DifferentialReflectivity), (1, 1058));
        assert_eq!(lut_range(Level2Product::DifferentialPhase), (1, 1023));
        assert_eq!(lut_range(Level2Product::ClutterFilterPowerRemoved), (1, 81));
    }
}
