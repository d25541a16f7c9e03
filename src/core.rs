use bevy::color::{Hsla, LinearRgba, Srgba};
use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::grid::ChangeCallback;
use crate::interaction::PanModifier;
use crate::{ChartError, Result};

/// sRGB color with straight alpha.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);

    /// Hue in degrees, saturation and lightness in [0, 1].
    pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let c = Srgba::from(Hsla::hsl(hue.rem_euclid(360.0), saturation, lightness));
        Self::rgba(c.red, c.green, c.blue, c.alpha)
    }

    /// Linear components, the layout Bevy expects for `Mesh::ATTRIBUTE_COLOR`.
    pub fn to_linear_array(self) -> [f32; 4] {
        let l = LinearRgba::from(Srgba::new(self.r, self.g, self.b, self.a));
        [l.red, l.green, l.blue, l.alpha]
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// Maps a normalized value to a color by sweeping hue across a fixed range.
///
/// `faded` keeps the hue but drops saturation and raises lightness; it is
/// used for cells that are not the focus of an in-progress edit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HueRamp {
    pub from_hue: f32,
    pub to_hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub faded_saturation: f32,
    pub faded_lightness: f32,
}

impl Default for HueRamp {
    fn default() -> Self {
        Self {
            from_hue: 240.0, // blue at the bottom of the range
            to_hue: 0.0,     // red at the top
            saturation: 0.85,
            lightness: 0.5,
            faded_saturation: 0.25,
            faded_lightness: 0.7,
        }
    }
}

impl HueRamp {
    pub fn hue(&self, t: f64) -> f32 {
        let t = clamp_unit(t) as f32;
        self.from_hue + (self.to_hue - self.from_hue) * t
    }

    pub fn sample(&self, t: f64) -> Color {
        Color::hsl(self.hue(t), self.saturation, self.lightness)
    }

    pub fn faded(&self, t: f64) -> Color {
        Color::hsl(self.hue(t), self.faded_saturation, self.faded_lightness)
    }
}

/// Digits kept when values leave the chart, so float noise from the
/// normalize/denormalize round trip never reaches observers.
pub const EXTERNAL_PRECISION: i32 = 5;

/// External numeric domain of the chart and its mapping onto [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds")]
pub struct ValueRange {
    min: f64,
    max: f64,
}

#[derive(Deserialize)]
struct RangeBounds {
    min: f64,
    max: f64,
}

impl TryFrom<RangeBounds> for ValueRange {
    type Error = ChartError;

    fn try_from(bounds: RangeBounds) -> std::result::Result<Self, Self::Error> {
        Self::new(bounds.min, bounds.max).map_err(|report| report.current_context().clone())
    }
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Report::new(ChartError::Configuration(format!(
                "value range bounds must be finite, got [{min}, {max}]"
            ))));
        }
        if min == max {
            return Err(Report::new(ChartError::Configuration(format!(
                "value range is degenerate: min and max are both {min}"
            ))));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn to_normalized(&self, external: f64) -> f64 {
        clamp_unit((external - self.min) / self.span())
    }

    pub fn to_external(&self, normalized: f64) -> f64 {
        normalized * self.span() + self.min
    }

    /// `steps + 1` values evenly subdividing `[min, max]`, both ends included.
    pub fn ticks(&self, steps: usize) -> Vec<f64> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| round_external(self.to_external(i as f64 / steps as f64)))
            .collect()
    }
}

pub fn round_external(value: f64) -> f64 {
    let scale = 10f64.powi(EXTERNAL_PRECISION);
    (value * scale).round() / scale
}

/// Clamp into [0, 1]; NaN collapses to 0 so it can never be stored.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Category labels; their lengths fix the grid dimensions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Column categories, left to right.
    pub x: Vec<String>,
    /// Row categories, front to back.
    pub y: Vec<String>,
}

impl AxisConfig {
    pub fn width(&self) -> usize {
        self.x.len()
    }

    pub fn height(&self) -> usize {
        self.y.len()
    }
}

/// Everything needed to construct a [`crate::chart::SurfaceChart`].
#[derive(Debug, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub min: f64,
    pub max: f64,
    pub axis: AxisConfig,
    /// Initial values, `data[row][col]`, in the external domain.
    #[serde(default)]
    pub data: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub colors: HueRamp,
    #[serde(default)]
    pub pan_modifier: PanModifier,
    #[serde(skip)]
    pub on_change: Option<ChangeCallback>,
}

impl SurfaceConfig {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            axis: AxisConfig::default(),
            data: None,
            colors: HueRamp::default(),
            pan_modifier: PanModifier::default(),
            on_change: None,
        }
    }

    pub fn x_axis<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.axis.x = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn y_axis<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.axis.y = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn data(mut self, data: Vec<Vec<f64>>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn colors(mut self, colors: HueRamp) -> Self {
        self.colors = colors;
        self
    }

    pub fn pan_modifier(mut self, modifier: PanModifier) -> Self {
        self.pan_modifier = modifier;
        self
    }

    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: FnMut(&crate::grid::CellChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_change = Some(ChangeCallback::new(f));
        self
    }

    /// Checks the parts that do not depend on the host container.
    pub fn validate(&self) -> Result<ValueRange> {
        if self.axis.x.is_empty() || self.axis.y.is_empty() {
            return Err(Report::new(ChartError::Configuration(format!(
                "both axes need at least one label (x: {}, y: {})",
                self.axis.x.len(),
                self.axis.y.len()
            ))));
        }
        ValueRange::new(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_clamps() {
        let range = ValueRange::new(0.0, 100.0).unwrap();
        assert_eq!(range.to_normalized(50.0), 0.5);
        assert_eq!(range.to_normalized(150.0), 1.0);
        assert_eq!(range.to_normalized(-3.0), 0.0);
        assert_eq!(range.to_normalized(f64::NAN), 0.0);
        assert_eq!(range.to_external(0.25), 25.0);
    }

    #[test]
    fn inverted_range_maps_linearly() {
        let range = ValueRange::new(10.0, -10.0).unwrap();
        assert_eq!(range.to_normalized(10.0), 0.0);
        assert_eq!(range.to_normalized(-10.0), 1.0);
        assert_eq!(range.to_external(0.5), 0.0);
    }

    #[test]
    fn rejects_degenerate_and_non_finite_ranges() {
        for (min, max) in [(5.0, 5.0), (f64::NAN, 1.0), (0.0, f64::INFINITY)] {
            let err = ValueRange::new(min, max).unwrap_err();
            assert!(matches!(err.current_context(), ChartError::Configuration(_)));
        }
    }

    #[test]
    fn deserializing_a_range_validates_it() {
        let range: ValueRange = serde_json::from_str(r#"{ "min": -2, "max": 8 }"#).unwrap();
        assert_eq!(range, ValueRange::new(-2.0, 8.0).unwrap());

        let err = serde_json::from_str::<ValueRange>(r#"{ "min": 1, "max": 1 }"#).unwrap_err();
        assert!(err.to_string().contains("degenerate"), "{err}");
    }

    #[test]
    fn rgba8_quantizes_and_clamps() {
        assert_eq!(Color::rgb(1.0, 0.5, 0.0).to_rgba8(), [255, 128, 0, 255]);
        assert_eq!(Color::rgba(1.5, -0.2, 0.2, 0.0).to_rgba8(), [255, 0, 51, 0]);
    }

    #[test]
    fn ticks_cover_both_ends() {
        let range = ValueRange::new(-1.0, 1.0).unwrap();
        let ticks = range.ticks(10);
        assert_eq!(ticks.len(), 11);
        assert_eq!(ticks[0], -1.0);
        assert_eq!(ticks[5], 0.0);
        assert_eq!(ticks[10], 1.0);
    }

    #[test]
    fn rounding_strips_float_noise() {
        assert_eq!(round_external(0.1 + 0.2), 0.3);
        assert_eq!(round_external(12.345678), 12.34568);
    }

    #[test]
    fn hue_sweeps_blue_to_red() {
        let ramp = HueRamp::default();
        assert_eq!(ramp.hue(0.0), 240.0);
        assert_eq!(ramp.hue(1.0), 0.0);
        assert_eq!(ramp.hue(0.5), 120.0);
        assert_eq!(ramp.hue(7.0), 0.0);

        let low = ramp.sample(0.0);
        assert!(low.b > low.r);
        let high = ramp.sample(1.0);
        assert!(high.r > high.b);
    }

    #[test]
    fn faded_color_is_lighter_and_greyer() {
        let ramp = HueRamp::default();
        let full = ramp.sample(1.0);
        let faded = ramp.faded(1.0);
        assert!(faded.g > full.g);
        assert!(faded.r - faded.g < full.r - full.g);
    }

    #[test]
    fn config_requires_both_axes() {
        let cfg = SurfaceConfig::new(0.0, 1.0).x_axis(["a"]);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err.current_context(), ChartError::Configuration(_)));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: SurfaceConfig = serde_json::from_str(
            r#"{ "min": 0, "max": 100, "axis": { "x": ["A", "B"], "y": ["1", "2"] } }"#,
        )
        .unwrap();
        assert_eq!(cfg.axis.width(), 2);
        assert!(cfg.data.is_none());
        assert!(cfg.on_change.is_none());
        assert_eq!(cfg.colors, HueRamp::default());
        assert_eq!(cfg.pan_modifier, PanModifier::Shift);
    }
}
