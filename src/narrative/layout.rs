//! Mapping from a page's layout to a rendering strategy.

use serde::Serialize;
use utoipa::ToSchema;

use super::reveal::node_threshold;
use crate::domain::{EventId, LayoutVariant, TimelineEvent};

/// How the ordered events are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    /// Vertical sequence revealed by scroll progress.
    SequentialLinear,
    /// Horizontal carousel.
    Carousel,
    /// Grid of cards.
    Grid,
}

/// Reveal channels a strategy consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RevealChannels {
    /// Scroll-percentage channel.
    pub percentage: bool,
    /// Visibility-ratio channel.
    pub intersection: bool,
}

/// One card in a render plan.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CardPlan {
    /// Event shown by this card.
    #[schema(value_type = String, format = Uuid)]
    pub event_id: EventId,
    /// Position in display order.
    pub index: usize,
    /// Progress above which the card is revealed. `None` when the strategy
    /// ignores the percentage channel.
    pub reveal_at: Option<f64>,
    /// Key the viewer reports intersection readings under.
    pub reveal_key: String,
}

/// Cards to render, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RenderPlan {
    /// Strategy the plan was built for.
    pub strategy: RenderStrategy,
    /// Channels the viewer must drive.
    pub channels: RevealChannels,
    /// Cards in display order.
    pub cards: Vec<CardPlan>,
}

impl RenderStrategy {
    /// Selects the strategy for a page layout.
    #[must_use]
    pub const fn for_layout(layout: LayoutVariant) -> Self {
        match layout {
            LayoutVariant::Linear => Self::SequentialLinear,
            LayoutVariant::Carousel => Self::Carousel,
            LayoutVariant::Grid => Self::Grid,
        }
    }

    /// Channels this strategy consumes.
    #[must_use]
    pub const fn channels(self) -> RevealChannels {
        match self {
            Self::SequentialLinear => RevealChannels {
                percentage: true,
                intersection: true,
            },
            Self::Carousel | Self::Grid => RevealChannels {
                percentage: false,
                intersection: true,
            },
        }
    }

    /// Builds the render plan for events already in display order.
    #[must_use]
    pub fn plan(self, ordered: &[TimelineEvent]) -> RenderPlan {
        let channels = self.channels();
        let total = ordered.len();
        let cards = ordered
            .iter()
            .enumerate()
            .map(|(index, event)| CardPlan {
                event_id: event.id,
                index,
                reveal_at: channels
                    .percentage
                    .then(|| node_threshold(index, total)),
                reveal_key: reveal_key(event.id),
            })
            .collect();
        RenderPlan {
            strategy: self,
            channels,
            cards,
        }
    }
}

/// Intersection key for an event card.
#[must_use]
pub fn reveal_key(event_id: EventId) -> String {
    format!("event-{event_id}")
}
