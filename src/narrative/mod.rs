//! Viewer-side narrative: ordering, scroll progress, reveal and layout.
//!
//! Everything here is pure or owned by a single [`ViewerSession`]; nothing
//! touches the store.

pub mod layout;
pub mod orderer;
pub mod reveal;
pub mod scroll;
pub mod session;

pub use layout::{CardPlan, RenderPlan, RenderStrategy, RevealChannels, reveal_key};
pub use orderer::order_timeline;
pub use reveal::{
    DEFAULT_CONNECT_THRESHOLD, DEFAULT_INTERSECTION_THRESHOLD, IntersectionReveal,
    MIN_CONNECT_THRESHOLD, NodeState, RevealPolicy, RevealStateMachine, node_threshold,
};
pub use scroll::{
    AnchorRect, DEFAULT_TRIGGER_FRACTION, FrameSampler, ScrollProgressEngine, ViewportSample,
};
pub use session::{RevealState, ViewerSession};
