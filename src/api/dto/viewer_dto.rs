//! Public viewer DTOs. Nothing here identifies the owner.

use serde::Serialize;
use utoipa::ToSchema;

use super::event_dto::EventDto;
use crate::config::NarrativeConfig;
use crate::domain::{LayoutVariant, Occasion, Page, VoiceNote};
use crate::narrative::RenderPlan;
use crate::service::PublicView;

/// Page fields a code holder may see.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicPageDto {
    /// Page identifier.
    pub id: uuid::Uuid,
    /// Recipient name.
    pub recipient_name: String,
    /// Title.
    pub title: String,
    /// Occasion.
    pub occasion: Occasion,
    /// Display font.
    pub font: String,
    /// Layout.
    pub layout: LayoutVariant,
    /// Soundtrack reference.
    pub soundtrack: Option<String>,
    /// Voice note.
    pub voice_note: Option<VoiceNote>,
    /// Closing quote, shown once the narrative is fully connected.
    pub closing_quote: Option<String>,
}

impl From<&Page> for PublicPageDto {
    fn from(page: &Page) -> Self {
        Self {
            id: *page.id.as_uuid(),
            recipient_name: page.recipient_name.clone(),
            title: page.title.clone(),
            occasion: page.occasion,
            font: page.font.clone(),
            layout: page.layout,
            soundtrack: page.soundtrack.clone(),
            voice_note: page.voice_note.clone(),
            closing_quote: page.closing_quote.clone(),
        }
    }
}

/// Reveal tuning the viewer needs to drive its local animation.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct RevealSettingsDto {
    /// Trigger line as a fraction of viewport height.
    pub trigger_fraction: f64,
    /// Progress at which the narrative is fully connected.
    pub connect_threshold: f64,
    /// Visible ratio that reveals an element.
    pub intersection_threshold: f64,
    /// Whether revealed nodes stay revealed on scroll-up.
    pub one_way: bool,
}

impl From<&NarrativeConfig> for RevealSettingsDto {
    fn from(cfg: &NarrativeConfig) -> Self {
        Self {
            trigger_fraction: cfg.engine.trigger_fraction(),
            connect_threshold: cfg.policy.connect_threshold,
            intersection_threshold: cfg.policy.intersection_threshold,
            one_way: cfg.policy.one_way,
        }
    }
}

/// Response body for `GET /view/{code}` and `GET /surprise/{slug}/{code}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicViewResponse {
    /// The page.
    pub page: PublicPageDto,
    /// Events in display order.
    pub events: Vec<EventDto>,
    /// Cards for the page's layout.
    pub plan: RenderPlan,
    /// Reveal tuning.
    pub reveal: RevealSettingsDto,
}

impl PublicViewResponse {
    /// Builds the response from a service view.
    #[must_use]
    pub fn new(view: &PublicView, narrative: &NarrativeConfig) -> Self {
        Self {
            page: PublicPageDto::from(&view.page),
            events: view.timeline.events.iter().map(EventDto::from).collect(),
            plan: view.plan.clone(),
            reveal: RevealSettingsDto::from(narrative),
        }
    }
}
