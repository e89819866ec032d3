//! Scroll geometry to narrative progress.
//!
//! The viewer reports viewport geometry on every scroll or resize. Samples
//! are coalesced by a [`FrameSampler`] so at most one is measured per frame,
//! and [`ScrollProgressEngine::measure`] turns the sample into a percentage.
//!
//! The engine is stateless. Jitter in the raw geometry can make consecutive
//! measurements go down slightly; smoothing that out is the job of the
//! consumer (see [`super::RevealStateMachine`]).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::KeepsakeError;

/// Default position of the trigger line as a fraction of viewport height.
pub const DEFAULT_TRIGGER_FRACTION: f64 = 0.75;

const GEOMETRY_SCALE: f64 = 4.0;

/// Vertical extent of an anchor element, relative to the viewport top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnchorRect {
    /// Distance from the viewport top to the element's top edge.
    pub top: f64,
    /// Element height.
    pub height: f64,
}

impl AnchorRect {
    /// Returns the vertical center of the anchor. Infinite when the rect
    /// reaches past `f64::MAX`.
    #[must_use]
    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// One geometry reading from the viewer.
///
/// Anchors are `None` until the corresponding elements are mounted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ViewportSample {
    /// Viewport height in pixels.
    pub viewport_height: f64,
    /// Top of the start anchor.
    #[serde(default)]
    pub start_anchor_top: Option<f64>,
    /// Rect of the end anchor.
    #[serde(default)]
    pub end_anchor: Option<AnchorRect>,
}

/// Converts viewport samples to progress in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollProgressEngine {
    trigger_fraction: f64,
}

impl Default for ScrollProgressEngine {
    fn default() -> Self {
        Self {
            trigger_fraction: DEFAULT_TRIGGER_FRACTION,
        }
    }
}

impl ScrollProgressEngine {
    /// Creates an engine with the trigger line at `trigger_fraction` of the
    /// viewport height.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::InvalidRequest`] unless the fraction is
    /// finite and within `(0, 1]`.
    pub fn new(trigger_fraction: f64) -> Result<Self, KeepsakeError> {
        if !trigger_fraction.is_finite() || trigger_fraction <= 0.0 || trigger_fraction > 1.0 {
            return Err(KeepsakeError::InvalidRequest(format!(
                "trigger fraction must be in (0, 1], got {trigger_fraction}"
            )));
        }
        Ok(Self { trigger_fraction })
    }

    /// Returns the configured trigger fraction.
    #[must_use]
    pub const fn trigger_fraction(&self) -> f64 {
        self.trigger_fraction
    }

    /// Measures progress for one sample.
    ///
    /// Returns `None` when either anchor is missing or any input is not
    /// finite. When the end anchor's center is at or above the start anchor
    /// the span is degenerate: the result is 100 once the trigger line has
    /// reached the start anchor, 0 before.
    #[must_use]
    pub fn measure(&self, sample: &ViewportSample) -> Option<f64> {
        let start = sample.start_anchor_top?;
        let end = sample.end_anchor?;
        let inputs = [sample.viewport_height, start, end.top, end.height];
        if !inputs.iter().all(|v| v.is_finite()) {
            return None;
        }

        // Scaled by a power of two so differences of finite inputs stay finite.
        let trigger = sample.viewport_height * self.trigger_fraction / GEOMETRY_SCALE;
        let start = start / GEOMETRY_SCALE;
        let end = end.top / GEOMETRY_SCALE + end.height / (2.0 * GEOMETRY_SCALE);

        let span = end - start;
        if span <= 0.0 {
            return Some(if trigger >= start { 100.0 } else { 0.0 });
        }
        let progress = (trigger - start) / span * 100.0;
        Some(if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 100.0) })
    }
}

/// Coalesces geometry notifications into one sample per frame.
///
/// Every notification replaces the held sample; [`FrameSampler::take_frame`]
/// hands out the latest one and clears it.
#[derive(Debug, Default)]
pub struct FrameSampler {
    pending: Option<ViewportSample>,
    coalesced: u64,
}

impl FrameSampler {
    /// Creates an empty sampler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a scroll or resize notification.
    pub fn notify(&mut self, sample: ViewportSample) {
        if self.pending.replace(sample).is_some() {
            self.coalesced = self.coalesced.saturating_add(1);
        }
    }

    /// Returns the sample to measure this frame, if any arrived.
    pub fn take_frame(&mut self) -> Option<ViewportSample> {
        self.pending.take()
    }

    /// Returns whether a sample is waiting for the next frame.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of notifications that were superseded before being measured.
    #[must_use]
    pub const fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn sample(viewport: f64, start: f64, end_top: f64, end_height: f64) -> ViewportSample {
        ViewportSample {
            viewport_height: viewport,
            start_anchor_top: Some(start),
            end_anchor: Some(AnchorRect {
                top: end_top,
                height: end_height,
            }),
        }
    }

    fn engine() -> ScrollProgressEngine {
        let Ok(engine) = ScrollProgressEngine::new(0.75) else {
            panic!("valid fraction");
        };
        engine
    }

    #[test]
    fn midway_scroll_measures_proportionally() {
        // trigger = 600, span = 1000 - 100 = 900
        let got = engine().measure(&sample(800.0, 100.0, 900.0, 200.0));
        let Some(progress) = got else {
            panic!("expected a measurement");
        };
        assert!((progress - 500.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn output_is_clamped() {
        let e = engine();
        assert_eq!(e.measure(&sample(800.0, 2000.0, 3000.0, 10.0)), Some(0.0));
        assert_eq!(e.measure(&sample(800.0, -5000.0, -100.0, 10.0)), Some(100.0));
    }

    #[test]
    fn degenerate_span_is_deterministic() {
        let e = engine();
        // end center == start top
        assert_eq!(e.measure(&sample(800.0, 500.0, 490.0, 20.0)), Some(100.0));
        assert_eq!(e.measure(&sample(800.0, 700.0, 690.0, 20.0)), Some(0.0));
        // end center above start
        assert_eq!(e.measure(&sample(800.0, 100.0, 0.0, 10.0)), Some(100.0));
    }

    #[test]
    fn missing_anchors_emit_nothing() {
        let e = engine();
        let mut s = sample(800.0, 100.0, 900.0, 200.0);
        s.end_anchor = None;
        assert_eq!(e.measure(&s), None);
        let mut s = sample(800.0, 100.0, 900.0, 200.0);
        s.start_anchor_top = None;
        assert_eq!(e.measure(&s), None);
    }

    #[test]
    fn non_finite_geometry_emits_nothing() {
        let e = engine();
        assert_eq!(e.measure(&sample(f64::NAN, 100.0, 900.0, 200.0)), None);
        assert_eq!(e.measure(&sample(800.0, f64::INFINITY, 900.0, 200.0)), None);
    }

    #[test]
    fn finite_geometry_always_lands_in_range() {
        let e = engine();
        let extremes = [f64::MAX, -f64::MAX, f64::MIN_POSITIVE, -f64::MIN_POSITIVE];
        let coords: Vec<f64> = [-1e9, -10.0, 0.0, 0.5, 300.0, 1e9]
            .into_iter()
            .chain(extremes)
            .collect();
        for &start in &coords {
            for &end_top in &coords {
                for viewport in [0.0, 1.0, 700.0, 1e6, f64::MAX] {
                    for height in [2.0, 0.0, f64::MAX] {
                        let Some(p) = e.measure(&sample(viewport, start, end_top, height)) else {
                            panic!("finite geometry must measure: {start} {end_top} {viewport} {height}");
                        };
                        assert!((0.0..=100.0).contains(&p), "{p} out of range");
                    }
                }
            }
        }
    }

    #[test]
    fn overflowing_geometry_still_measures() {
        let e = engine();
        // Differences of these coordinates overflow without scaling.
        let Some(p) = e.measure(&sample(f64::MAX, -f64::MAX, f64::MAX, 0.0)) else {
            panic!("expected a measurement");
        };
        assert!((0.0..=100.0).contains(&p));
        assert!(p > 0.0);

        // The end anchor's center lies past f64::MAX.
        let Some(p) = e.measure(&sample(800.0, 0.0, f64::MAX, f64::MAX)) else {
            panic!("expected a measurement");
        };
        assert!((0.0..1e-9).contains(&p));
    }

    #[test]
    fn trigger_fraction_is_validated() {
        assert!(ScrollProgressEngine::new(0.7).is_ok());
        assert!(ScrollProgressEngine::new(0.0).is_err());
        assert!(ScrollProgressEngine::new(1.5).is_err());
        assert!(ScrollProgressEngine::new(f64::NAN).is_err());
    }

    #[test]
    fn sampler_keeps_latest_notification_per_frame() {
        let mut sampler = FrameSampler::new();
        assert_eq!(sampler.take_frame(), None);

        sampler.notify(sample(800.0, 1.0, 2.0, 2.0));
        sampler.notify(sample(800.0, 3.0, 4.0, 2.0));
        assert!(sampler.has_pending());
        assert_eq!(sampler.coalesced(), 1);

        let Some(frame) = sampler.take_frame() else {
            panic!("sample expected");
        };
        assert_eq!(frame.start_anchor_top, Some(3.0));
        assert_eq!(sampler.take_frame(), None);
    }
}
