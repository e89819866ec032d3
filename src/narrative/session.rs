//! Per-viewer narrative context.
//!
//! A [`ViewerSession`] is the single owner of one viewer's reveal state. The
//! connection that created it feeds geometry and intersection readings
//! through explicit update functions and reads back a [`RevealState`]; no
//! other task shares it.

use serde::Serialize;
use utoipa::ToSchema;

use super::layout::{RenderPlan, RenderStrategy};
use super::reveal::{
    IntersectionReveal, NodeState, RevealPolicy, RevealStateMachine, node_threshold,
};
use super::scroll::{FrameSampler, ScrollProgressEngine, ViewportSample};
use crate::domain::{LayoutVariant, PageId, TimelineEvent};

/// Reveal state reported to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RevealState {
    /// Page being viewed.
    #[schema(value_type = String, format = Uuid)]
    pub page_id: PageId,
    /// Active strategy.
    pub strategy: RenderStrategy,
    /// Accepted progress in `[0, 100]`.
    pub progress: f64,
    /// Percentage-channel state per card, in display order.
    pub nodes: Vec<NodeState>,
    /// Keys revealed through the intersection channel.
    pub revealed_keys: Vec<String>,
    /// Whether the closing content may be shown.
    pub fully_connected: bool,
}

/// Reveal context for one viewer of one page.
#[derive(Debug)]
pub struct ViewerSession {
    page_id: PageId,
    engine: ScrollProgressEngine,
    sampler: FrameSampler,
    machine: RevealStateMachine,
    intersections: IntersectionReveal,
    plan: RenderPlan,
}

impl ViewerSession {
    /// Creates a session with no events.
    #[must_use]
    pub fn new(
        page_id: PageId,
        layout: LayoutVariant,
        engine: ScrollProgressEngine,
        policy: RevealPolicy,
    ) -> Self {
        Self {
            page_id,
            engine,
            sampler: FrameSampler::new(),
            machine: RevealStateMachine::new(policy, 0),
            intersections: IntersectionReveal::new(policy.intersection_threshold),
            plan: RenderStrategy::for_layout(layout).plan(&[]),
        }
    }

    /// Page this session views.
    #[must_use]
    pub const fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Current render plan.
    #[must_use]
    pub const fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    /// Rebuilds the plan from a new ordered timeline. Returns `true` if the
    /// reveal state changed.
    pub fn apply_timeline(&mut self, ordered: &[TimelineEvent]) -> bool {
        self.plan = self.plan.strategy.plan(ordered);
        self.machine.set_node_count(ordered.len())
    }

    /// Switches layout, keeping the current cards and reveal progress.
    pub fn set_layout(&mut self, layout: LayoutVariant) -> bool {
        let strategy = RenderStrategy::for_layout(layout);
        if strategy == self.plan.strategy {
            return false;
        }
        let channels = strategy.channels();
        let total = self.plan.cards.len();
        let mut cards = std::mem::take(&mut self.plan.cards);
        for card in &mut cards {
            card.reveal_at = channels
                .percentage
                .then(|| node_threshold(card.index, total));
        }
        self.plan = RenderPlan {
            strategy,
            channels,
            cards,
        };
        true
    }

    /// Records a scroll or resize reading for the next frame.
    pub fn notify_scroll(&mut self, sample: ViewportSample) {
        self.sampler.notify(sample);
    }

    /// Measures the latest reading, if any, and feeds the percentage
    /// channel. Returns the new state when something changed.
    pub fn on_frame(&mut self) -> Option<RevealState> {
        let sample = self.sampler.take_frame()?;
        if !self.plan.channels.percentage {
            return None;
        }
        let progress = self.engine.measure(&sample)?;
        self.machine.apply_progress(progress).then(|| self.state())
    }

    /// Feeds the intersection channel. Returns the new state when `key` was
    /// newly revealed.
    pub fn intersect(&mut self, key: &str, visible_ratio: f64) -> Option<RevealState> {
        self.intersections
            .observe(key, visible_ratio)
            .then(|| self.state())
    }

    /// Clears both channels.
    pub fn reset(&mut self) -> RevealState {
        self.machine.reset();
        self.intersections.reset();
        self.state()
    }

    /// Whether the closing content may be shown.
    ///
    /// Percentage-driven layouts use the fully-connected flag. Layouts that
    /// only use the intersection channel connect once every card has been
    /// seen.
    #[must_use]
    pub fn is_fully_connected(&self) -> bool {
        if self.plan.channels.percentage {
            return self.machine.is_fully_connected();
        }
        !self.plan.cards.is_empty()
            && self
                .plan
                .cards
                .iter()
                .all(|c| self.intersections.is_revealed(&c.reveal_key))
    }

    /// Snapshot of the current reveal state.
    #[must_use]
    pub fn state(&self) -> RevealState {
        RevealState {
            page_id: self.page_id,
            strategy: self.plan.strategy,
            progress: self.machine.progress(),
            nodes: self.machine.nodes().to_vec(),
            revealed_keys: self
                .intersections
                .revealed_keys()
                .map(str::to_string)
                .collect(),
            fully_connected: self.is_fully_connected(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventId;
    use crate::narrative::AnchorRect;
    use chrono::{NaiveDate, Utc};

    fn events(page_id: PageId, n: i64) -> Vec<TimelineEvent> {
        let day = NaiveDate::from_ymd_opt(2020, 5, 5).unwrap_or_default();
        (0..n)
            .map(|i| TimelineEvent::placeholder(EventId::new(), page_id, i, day, Utc::now()))
            .collect()
    }

    fn at(start_top: f64) -> ViewportSample {
        // trigger line at 600; span 1000
        ViewportSample {
            viewport_height: 800.0,
            start_anchor_top: Some(start_top),
            end_anchor: Some(AnchorRect {
                top: start_top + 990.0,
                height: 20.0,
            }),
        }
    }

    fn session(layout: LayoutVariant) -> ViewerSession {
        ViewerSession::new(
            PageId::new(),
            layout,
            ScrollProgressEngine::default(),
            RevealPolicy::default(),
        )
    }

    #[test]
    fn linear_session_reveals_with_scroll() {
        let mut s = session(LayoutVariant::Linear);
        let page_id = s.page_id();
        s.apply_timeline(&events(page_id, 2));

        s.notify_scroll(at(600.0));
        // progress 0 on first frame: node 0 needs > 0
        assert!(s.on_frame().is_none());

        s.notify_scroll(at(0.0));
        let Some(state) = s.on_frame() else {
            panic!("progress 60 should change state");
        };
        assert!((state.progress - 60.0).abs() < 1e-9);
        assert_eq!(state.nodes, vec![NodeState::Revealed, NodeState::Revealed]);
        assert!(!state.fully_connected);

        s.notify_scroll(at(-400.0));
        let Some(state) = s.on_frame() else {
            panic!("progress 100 should connect");
        };
        assert!(state.fully_connected);
    }

    #[test]
    fn frame_without_notification_measures_nothing() {
        let mut s = session(LayoutVariant::Linear);
        assert!(s.on_frame().is_none());
    }

    #[test]
    fn grid_session_ignores_scroll_and_connects_on_intersections() {
        let mut s = session(LayoutVariant::Grid);
        let page_id = s.page_id();
        s.apply_timeline(&events(page_id, 2));
        s.notify_scroll(at(-400.0));
        assert!(s.on_frame().is_none());
        assert!(s.state().progress.abs() < f64::EPSILON);

        let keys: Vec<String> = s.plan().cards.iter().map(|c| c.reveal_key.clone()).collect();
        let [first, second] = keys.as_slice() else {
            panic!("two cards expected");
        };
        assert!(s.intersect(first, 0.5).is_some());
        assert!(!s.is_fully_connected());
        let Some(state) = s.intersect(second, 0.2) else {
            panic!("newly revealed");
        };
        assert!(state.fully_connected);
    }

    #[test]
    fn switching_layout_keeps_cards() {
        let mut s = session(LayoutVariant::Carousel);
        let page_id = s.page_id();
        s.apply_timeline(&events(page_id, 2));
        assert!(s.set_layout(LayoutVariant::Linear));
        assert_eq!(s.plan().cards.len(), 2);
        assert_eq!(
            s.plan().cards.get(1).and_then(|c| c.reveal_at),
            Some(50.0)
        );
        assert!(!s.set_layout(LayoutVariant::Linear));
    }

    #[test]
    fn reset_returns_to_dormant() {
        let mut s = session(LayoutVariant::Linear);
        let page_id = s.page_id();
        s.apply_timeline(&events(page_id, 1));
        s.notify_scroll(at(-400.0));
        let _ = s.on_frame();
        let state = s.reset();
        assert_eq!(state.nodes, vec![NodeState::Dormant]);
        assert!(!state.fully_connected);
    }
}
