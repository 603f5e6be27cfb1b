use std::fs;
use std::path::Path;

pub const APP_VERSION: &str = "v0.1.0";

/// File the configuration is persisted to, relative to the working
/// directory. Rewritten in full on every successful settings apply.
pub const SETTINGS_FILE: &str = "settings.txt";

/// 24-bit RGB color, stored in the settings file as `#RRGGBB`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Encodes as uppercase `#RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Decodes `#RRGGBB` or `RRGGBB`, case-insensitive.
    pub fn parse_hex(text: &str) -> Option<Rgb> {
        let digits = text.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
        let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
        let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
        Some(Rgb::new(r, g, b))
    }
}

/// All user-tunable parameters of the overlay.
///
/// Every field has a default, and both the file loader and the settings
/// apply path validate per field, so an instance never holds a value
/// outside the ranges documented below.
#[derive(Clone, PartialEq, Debug)]
pub struct VizConfig {
    /// Amplitude sensitivity applied to the captured signal.
    /// Higher = bars react to quieter audio. Must be positive.
    pub sensitivity: f32,

    /// Multiplier on the computed per-bar width. Must be positive.
    /// Values above 1 make bars overlap their neighbours on purpose.
    pub bar_width_multiplier: i32,

    /// Pixels between adjacent bars. Zero packs them edge to edge.
    pub bar_spread: i32,

    /// Number of bars drawn across the overlay, 1 to 300.
    pub bar_count: i32,

    /// Fill color of the bars.
    pub bar_color: Rgb,

    /// Color of the now-playing text line.
    pub text_color: Rgb,

    /// Desktop position of the overlay's top-left corner. Non-negative.
    pub window_pos_x: i32,
    pub window_pos_y: i32,

    /// Overlay client size in pixels, at least 100 each way.
    pub window_width: i32,
    pub window_height: i32,

    /// Keep the overlay above every other window instead of pinned
    /// behind them at desktop level.
    pub top_most: bool,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            sensitivity: 200.0,
            bar_width_multiplier: 1,
            bar_spread: 1,
            bar_count: 80,
            bar_color: Rgb::WHITE,
            text_color: Rgb::WHITE,
            window_pos_x: 1500,
            window_pos_y: 0,
            window_width: 400,
            window_height: 200,
            top_most: false,
        }
    }
}

impl VizConfig {
    pub const MIN_BAR_COUNT: i32 = 1;
    pub const MAX_BAR_COUNT: i32 = 300;
    pub const MIN_WINDOW_DIM: i32 = 100;

    pub fn valid_sensitivity(v: f32) -> bool {
        v.is_finite() && v > 0.0
    }

    pub fn valid_bar_width_multiplier(v: i32) -> bool {
        v > 0
    }

    pub fn valid_bar_spread(v: i32) -> bool {
        v >= 0
    }

    pub fn valid_bar_count(v: i32) -> bool {
        (Self::MIN_BAR_COUNT..=Self::MAX_BAR_COUNT).contains(&v)
    }

    pub fn valid_window_dim(v: i32) -> bool {
        v >= Self::MIN_WINDOW_DIM
    }

    pub fn valid_window_pos(v: i32) -> bool {
        v >= 0
    }

    /// Reads `key = value` lines from `path` over the defaults.
    ///
    /// A missing file, unknown keys, unparseable values and values
    /// outside a field's range all leave the affected fields at their
    /// defaults.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::default();
        let Ok(text) = fs::read_to_string(path) else {
            return config;
        };
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            config.set_field(key.trim(), value.trim());
        }
        config
    }

    /// Writes every field as one `key = value` line.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let out = format!(
            "sensitivity = {}\n\
             barWidthMultiplier = {}\n\
             barSpread = {}\n\
             barCount = {}\n\
             barColor = {}\n\
             textColor = {}\n\
             windowPosX = {}\n\
             windowPosY = {}\n\
             windowWidth = {}\n\
             windowHeight = {}\n\
             topMost = {}\n",
            self.sensitivity,
            self.bar_width_multiplier,
            self.bar_spread,
            self.bar_count,
            self.bar_color.to_hex(),
            self.text_color.to_hex(),
            self.window_pos_x,
            self.window_pos_y,
            self.window_width,
            self.window_height,
            if self.top_most { 1 } else { 0 },
        );
        fs::write(path, out)
    }

    fn set_field(&mut self, key: &str, value: &str) {
        match key {
            "sensitivity" => {
                if let Ok(v) = value.parse::<f32>() {
                    if Self::valid_sensitivity(v) {
                        self.sensitivity = v;
                    }
                }
            }
            "barWidthMultiplier" => {
                if let Ok(v) = value.parse::<i32>() {
                    if Self::valid_bar_width_multiplier(v) {
                        self.bar_width_multiplier = v;
                    }
                }
            }
            "barSpread" => {
                if let Ok(v) = value.parse::<i32>() {
                    if Self::valid_bar_spread(v) {
                        self.bar_spread = v;
                    }
                }
            }
            "barCount" => {
                if let Ok(v) = value.parse::<i32>() {
                    if Self::valid_bar_count(v) {
                        self.bar_count = v;
                    }
                }
            }
            "barColor" => {
                if let Some(c) = Rgb::parse_hex(value) {
                    self.bar_color = c;
                }
            }
            "textColor" => {
                if let Some(c) = Rgb::parse_hex(value) {
                    self.text_color = c;
                }
            }
            "windowPosX" => {
                if let Ok(v) = value.parse::<i32>() {
                    if Self::valid_window_pos(v) {
                        self.window_pos_x = v;
                    }
                }
            }
            "windowPosY" => {
                if let Ok(v) = value.parse::<i32>() {
                    if Self::valid_window_pos(v) {
                        self.window_pos_y = v;
                    }
                }
            }
            "windowWidth" => {
                if let Ok(v) = value.parse::<i32>() {
                    if Self::valid_window_dim(v) {
                        self.window_width = v;
                    }
                }
            }
            "windowHeight" => {
                if let Ok(v) = value.parse::<i32>() {
                    if Self::valid_window_dim(v) {
                        self.window_height = v;
                    }
                }
            }
            "topMost" => self.top_most = value == "1",
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("loopbars-config-{}-{}.txt", tag, std::process::id()))
    }

    #[test]
    fn hex_encoding_is_uppercase_rrggbb() {
        assert_eq!(Rgb::new(255, 0, 0).to_hex(), "#FF0000");
        assert_eq!(Rgb::new(18, 52, 86).to_hex(), "#123456");
    }

    #[test]
    fn hex_decoding_accepts_prefix_and_case() {
        assert_eq!(Rgb::parse_hex("#FF0000"), Some(Rgb::new(255, 0, 0)));
        assert_eq!(Rgb::parse_hex("00ff7f"), Some(Rgb::new(0, 255, 127)));
        assert_eq!(Rgb::parse_hex(" #AbCdEf "), Some(Rgb::new(171, 205, 239)));
    }

    #[test]
    fn hex_decoding_rejects_garbage() {
        assert_eq!(Rgb::parse_hex(""), None);
        assert_eq!(Rgb::parse_hex("#FF00"), None);
        assert_eq!(Rgb::parse_hex("#FF00001"), None);
        assert_eq!(Rgb::parse_hex("not-hex"), None);
        assert_eq!(Rgb::parse_hex("#GGGGGG"), None);
    }

    #[test]
    fn defaults_pass_their_own_validation() {
        let config = VizConfig::default();
        assert!(VizConfig::valid_sensitivity(config.sensitivity));
        assert!(VizConfig::valid_bar_width_multiplier(config.bar_width_multiplier));
        assert!(VizConfig::valid_bar_spread(config.bar_spread));
        assert!(VizConfig::valid_bar_count(config.bar_count));
        assert!(VizConfig::valid_window_dim(config.window_width));
        assert!(VizConfig::valid_window_dim(config.window_height));
        assert!(VizConfig::valid_window_pos(config.window_pos_x));
        assert!(VizConfig::valid_window_pos(config.window_pos_y));
    }

    #[test]
    fn save_then_load_round_trips_exactly() {
        let path = temp_path("roundtrip");
        let config = VizConfig {
            sensitivity: 312.5,
            bar_count: 120,
            bar_color: Rgb::new(18, 52, 86),
            text_color: Rgb::new(255, 136, 0),
            top_most: true,
            ..VizConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = VizConfig::load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let loaded = VizConfig::load(Path::new("no-such-settings-file.txt"));
        assert_eq!(loaded, VizConfig::default());
    }

    #[test]
    fn load_skips_unknown_keys_and_malformed_lines() {
        let path = temp_path("malformed");
        fs::write(
            &path,
            "barCount = 40\nnot a key value line\nmystery = 9\nbarSpread = \n",
        )
        .unwrap();
        let loaded = VizConfig::load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.bar_count, 40);
        assert_eq!(loaded.bar_spread, VizConfig::default().bar_spread);
    }

    #[test]
    fn load_keeps_defaults_for_out_of_range_values() {
        let path = temp_path("range");
        fs::write(&path, "barCount = 5000\nsensitivity = -1\nwindowWidth = 150\n").unwrap();
        let loaded = VizConfig::load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.bar_count, VizConfig::default().bar_count);
        assert_eq!(loaded.sensitivity, VizConfig::default().sensitivity);
        assert_eq!(loaded.window_width, 150);
    }

    #[test]
    fn top_most_serializes_as_one_or_zero() {
        let path = temp_path("topmost");
        let config = VizConfig {
            top_most: true,
            ..VizConfig::default()
        };
        config.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(text.contains("topMost = 1"));
    }
}
