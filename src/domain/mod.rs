//! Domain layer: identities, documents, patches and change notifications.
//!
//! This module contains the page and timeline-event documents, the
//! single-field patches that mutate them, access codes and slugs, and the
//! change bus the store uses to announce confirmed writes.

pub mod access_code;
pub mod event_bus;
pub mod ids;
pub mod page;
pub mod slug;
pub mod store_change;
pub mod timeline_event;

pub use access_code::{ACCESS_CODE_ALPHABET, ACCESS_CODE_LEN, AccessCode};
pub use event_bus::ChangeBus;
pub use ids::{EventId, OwnerId, PageId};
pub use page::{LayoutVariant, NewPage, Occasion, Page, PagePatch, VoiceNote};
pub use slug::{public_path, public_url, slugify, view_path};
pub use store_change::StoreChange;
pub use timeline_event::{EventPatch, TimelineEvent, parse_event_date};
