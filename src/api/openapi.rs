//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use super::dto;
use super::handlers::{event, page, suggestion, system, viewer};
use crate::domain::{LayoutVariant, Occasion, VoiceNote};
use crate::error::{ErrorBody, ErrorResponse};
use crate::narrative::{CardPlan, RenderPlan, RenderStrategy, RevealChannels};
use crate::service::{Suggestion, SuggestionKind};

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "keepsake-gateway",
        description = "Secret-code memory timelines with live sync and scroll-driven reveal"
    ),
    paths(
        page::create_page,
        page::list_pages,
        page::get_page,
        page::update_page,
        page::delete_page,
        event::add_event,
        event::update_event,
        event::delete_event,
        viewer::view_by_code,
        viewer::view_by_link,
        suggestion::suggest,
        system::health_handler,
        system::reveal_config_handler,
    ),
    components(schemas(
        dto::AcceptedResponse,
        dto::FieldPatchRequest,
        dto::CreatePageRequest,
        dto::CreatePageResponse,
        dto::PageDto,
        dto::PageListResponse,
        dto::DashboardResponse,
        dto::EventDto,
        dto::CreateEventResponse,
        dto::PublicPageDto,
        dto::PublicViewResponse,
        dto::RevealSettingsDto,
        dto::SuggestionRequest,
        dto::SuggestionListResponse,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
        Occasion,
        LayoutVariant,
        VoiceNote,
        RenderPlan,
        RenderStrategy,
        RevealChannels,
        CardPlan,
        Suggestion,
        SuggestionKind,
    )),
    tags(
        (name = "Pages", description = "Owner dashboard"),
        (name = "Events", description = "Timeline events under a page"),
        (name = "Viewer", description = "Public access by code"),
        (name = "Suggestions", description = "Track and visual suggestions"),
        (name = "System", description = "Health and tuning"),
    )
)]
pub struct ApiDoc;
