//! The page document: one owned celebration timeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AccessCode, OwnerId, PageId, slugify};

/// The occasion a page celebrates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Occasion {
    /// Birthday surprise.
    Birthday,
    /// Relationship anniversary.
    Anniversary,
    /// Wedding.
    Wedding,
    /// Graduation.
    Graduation,
    /// Valentine's day.
    Valentine,
    /// Leaving party.
    Farewell,
    /// Anything else.
    #[default]
    Other,
}

impl Occasion {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::Anniversary => "anniversary",
            Self::Wedding => "wedding",
            Self::Graduation => "graduation",
            Self::Valentine => "valentine",
            Self::Farewell => "farewell",
            Self::Other => "other",
        }
    }
}

impl FromStr for Occasion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birthday" => Ok(Self::Birthday),
            "anniversary" => Ok(Self::Anniversary),
            "wedding" => Ok(Self::Wedding),
            "graduation" => Ok(Self::Graduation),
            "valentine" => Ok(Self::Valentine),
            "farewell" => Ok(Self::Farewell),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown occasion: {other}")),
        }
    }
}

/// Rendering strategy the owner picked for the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LayoutVariant {
    /// Vertical scroll-driven narrative.
    #[default]
    Linear,
    /// Horizontal card carousel.
    Carousel,
    /// Photo grid.
    Grid,
}

impl LayoutVariant {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Carousel => "carousel",
            Self::Grid => "grid",
        }
    }
}

impl FromStr for LayoutVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "carousel" => Ok(Self::Carousel),
            "grid" => Ok(Self::Grid),
            other => Err(format!("unknown layout: {other}")),
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded voice note attached to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoiceNote {
    /// Reference to the uploaded audio (upload encoding happens elsewhere).
    pub reference: String,
    /// Recording length in whole seconds.
    pub duration_secs: u32,
}

/// Default title for a freshly created page.
pub const DEFAULT_TITLE: &str = "Our Story";

/// Default display font.
pub const DEFAULT_FONT: &str = "serif";

/// A page document as held by the store.
///
/// `owner` and `access_code` are fixed at creation; every other field is
/// changed through a [`PagePatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page identity.
    pub id: PageId,
    /// Identity of the creator. Immutable.
    pub owner: OwnerId,
    /// Name of the person the page is for.
    pub recipient_name: String,
    /// Page title.
    pub title: String,
    /// What the page celebrates.
    pub occasion: Occasion,
    /// Display font family.
    pub font: String,
    /// Rendering strategy.
    pub layout: LayoutVariant,
    /// Optional soundtrack reference.
    pub soundtrack: Option<String>,
    /// Optional recorded voice note.
    pub voice_note: Option<VoiceNote>,
    /// Optional closing quote shown once the narrative is fully connected.
    pub closing_quote: Option<String>,
    /// Secret code granting read access.
    pub access_code: AccessCode,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last field mutation.
    pub updated_at: DateTime<Utc>,
}

/// Owner-supplied fields for a new page. Everything is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPage {
    /// Recipient name; defaults to empty.
    #[serde(default)]
    pub recipient_name: Option<String>,
    /// Title; defaults to [`DEFAULT_TITLE`].
    #[serde(default)]
    pub title: Option<String>,
    /// Occasion; defaults to [`Occasion::Other`].
    #[serde(default)]
    pub occasion: Option<Occasion>,
    /// Font; defaults to [`DEFAULT_FONT`].
    #[serde(default)]
    pub font: Option<String>,
    /// Layout; defaults to [`LayoutVariant::Linear`].
    #[serde(default)]
    pub layout: Option<LayoutVariant>,
}

impl Page {
    /// Builds a page from an owner's draft.
    #[must_use]
    pub fn new(
        id: PageId,
        owner: OwnerId,
        access_code: AccessCode,
        draft: NewPage,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            recipient_name: draft.recipient_name.unwrap_or_default(),
            title: draft.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            occasion: draft.occasion.unwrap_or_default(),
            font: draft.font.unwrap_or_else(|| DEFAULT_FONT.to_string()),
            layout: draft.layout.unwrap_or_default(),
            soundtrack: None,
            voice_note: None,
            closing_quote: None,
            access_code,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the cosmetic slug for this page's public URL.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.recipient_name)
    }

    /// Applies one field mutation and bumps `updated_at`.
    pub fn apply(&mut self, patch: &PagePatch, at: DateTime<Utc>) {
        match patch {
            PagePatch::Title(v) => self.title.clone_from(v),
            PagePatch::RecipientName(v) => self.recipient_name.clone_from(v),
            PagePatch::Occasion(v) => self.occasion = *v,
            PagePatch::Font(v) => self.font.clone_from(v),
            PagePatch::Layout(v) => self.layout = *v,
            PagePatch::Soundtrack(v) => self.soundtrack.clone_from(v),
            PagePatch::VoiceNote(v) => self.voice_note.clone_from(v),
            PagePatch::ClosingQuote(v) => self.closing_quote.clone_from(v),
        }
        self.updated_at = at;
    }
}

/// A single-field page mutation.
///
/// Serialized as `{"field": "title", "value": "..."}`. There is no variant
/// for the owner or the access code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PagePatch {
    /// Set the title.
    Title(String),
    /// Set the recipient name (and with it the cosmetic slug).
    RecipientName(String),
    /// Set the occasion.
    Occasion(Occasion),
    /// Set the display font.
    Font(String),
    /// Switch the layout variant.
    Layout(LayoutVariant),
    /// Set or clear the soundtrack.
    Soundtrack(Option<String>),
    /// Set or clear the voice note.
    VoiceNote(Option<VoiceNote>),
    /// Set or clear the closing quote.
    ClosingQuote(Option<String>),
}

impl PagePatch {
    /// Returns the name of the field this patch writes.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::RecipientName(_) => "recipient_name",
            Self::Occasion(_) => "occasion",
            Self::Font(_) => "font",
            Self::Layout(_) => "layout",
            Self::Soundtrack(_) => "soundtrack",
            Self::VoiceNote(_) => "voice_note",
            Self::ClosingQuote(_) => "closing_quote",
        }
    }
}
