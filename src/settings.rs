use crate::config::{Rgb, VizConfig};
use crate::state::{RedrawSignal, SharedViz, lock_or_recover};
use log::{debug, info, warn};
use std::path::Path;
use std::str::FromStr;

/// Editable form state for every tunable, mirroring the settings form.
///
/// Numeric fields stay text until apply, so half-typed input never
/// touches the live configuration.
#[derive(Clone, PartialEq, Debug)]
pub struct SettingsDraft {
    pub sensitivity: String,
    pub bar_width_multiplier: String,
    pub bar_spread: String,
    pub bar_count: String,
    pub bar_color: String,
    pub text_color: String,
    pub window_pos_x: String,
    pub window_pos_y: String,
    pub window_width: String,
    pub window_height: String,
    pub top_most: bool,
}

impl SettingsDraft {
    /// Prefills the form from the live configuration.
    pub fn from_config(config: &VizConfig) -> Self {
        Self {
            sensitivity: config.sensitivity.to_string(),
            bar_width_multiplier: config.bar_width_multiplier.to_string(),
            bar_spread: config.bar_spread.to_string(),
            bar_count: config.bar_count.to_string(),
            bar_color: config.bar_color.to_hex(),
            text_color: config.text_color.to_hex(),
            window_pos_x: config.window_pos_x.to_string(),
            window_pos_y: config.window_pos_y.to_string(),
            window_width: config.window_width.to_string(),
            window_height: config.window_height.to_string(),
            top_most: config.top_most,
        }
    }
}

fn parse_valid<T: FromStr + Copy>(text: &str, valid: impl Fn(T) -> bool) -> Option<T> {
    text.trim().parse::<T>().ok().filter(|&v| valid(v))
}

/// Applies one draft onto a configuration, field by field.
///
/// A field only changes when its text parses and passes its validity
/// predicate; everything else keeps its prior value, so one bad entry
/// never blocks the rest. Returns how many fields were rejected.
pub fn apply_fields(config: &mut VizConfig, draft: &SettingsDraft) -> usize {
    let mut rejected = 0;

    match parse_valid(&draft.sensitivity, VizConfig::valid_sensitivity) {
        Some(v) => config.sensitivity = v,
        None => {
            debug!("Rejecting sensitivity {:?}", draft.sensitivity);
            rejected += 1;
        }
    }
    match parse_valid(
        &draft.bar_width_multiplier,
        VizConfig::valid_bar_width_multiplier,
    ) {
        Some(v) => config.bar_width_multiplier = v,
        None => {
            debug!(
                "Rejecting barWidthMultiplier {:?}",
                draft.bar_width_multiplier
            );
            rejected += 1;
        }
    }
    match parse_valid(&draft.bar_spread, VizConfig::valid_bar_spread) {
        Some(v) => config.bar_spread = v,
        None => {
            debug!("Rejecting barSpread {:?}", draft.bar_spread);
            rejected += 1;
        }
    }
    match parse_valid(&draft.bar_count, VizConfig::valid_bar_count) {
        Some(v) => config.bar_count = v,
        None => {
            debug!("Rejecting barCount {:?}", draft.bar_count);
            rejected += 1;
        }
    }
    match Rgb::parse_hex(&draft.bar_color) {
        Some(c) => config.bar_color = c,
        None => {
            debug!("Rejecting barColor {:?}", draft.bar_color);
            rejected += 1;
        }
    }
    match Rgb::parse_hex(&draft.text_color) {
        Some(c) => config.text_color = c,
        None => {
            debug!("Rejecting textColor {:?}", draft.text_color);
            rejected += 1;
        }
    }
    match parse_valid(&draft.window_pos_x, VizConfig::valid_window_pos) {
        Some(v) => config.window_pos_x = v,
        None => {
            debug!("Rejecting windowPosX {:?}", draft.window_pos_x);
            rejected += 1;
        }
    }
    match parse_valid(&draft.window_pos_y, VizConfig::valid_window_pos) {
        Some(v) => config.window_pos_y = v,
        None => {
            debug!("Rejecting windowPosY {:?}", draft.window_pos_y);
            rejected += 1;
        }
    }
    match parse_valid(&draft.window_width, VizConfig::valid_window_dim) {
        Some(v) => config.window_width = v,
        None => {
            debug!("Rejecting windowWidth {:?}", draft.window_width);
            rejected += 1;
        }
    }
    match parse_valid(&draft.window_height, VizConfig::valid_window_dim) {
        Some(v) => config.window_height = v,
        None => {
            debug!("Rejecting windowHeight {:?}", draft.window_height);
            rejected += 1;
        }
    }
    config.top_most = draft.top_most;

    rejected
}

/// Full apply path: validate into the shared configuration, persist the
/// result, and wake the overlay so placement and style get refreshed.
/// Returns the configuration that ended up applied.
pub fn apply_and_store(
    shared: &SharedViz,
    draft: &SettingsDraft,
    path: &Path,
    redraw: &RedrawSignal,
) -> VizConfig {
    let (applied, rejected) = {
        let mut state = lock_or_recover(shared);
        let rejected = apply_fields(&mut state.config, draft);
        (state.config.clone(), rejected)
    };

    if rejected == 0 {
        info!("Settings applied");
    } else {
        info!("Settings applied, {rejected} field(s) kept their previous values");
    }

    // persist outside the lock so file IO never stalls the drain loop
    if let Err(err) = applied.save(path) {
        warn!("Could not persist settings to {}: {err}", path.display());
    }

    redraw.request();
    applied
}
