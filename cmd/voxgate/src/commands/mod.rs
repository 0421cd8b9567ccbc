//! CLI commands module.

mod enroll;
mod inspect;
mod sidecar;
mod trial;
mod util;

pub use enroll::{EnrollCommand, RefitCommand};
pub use inspect::{ClustersCommand, ConfigCommand, PromptsCommand, SpeakersCommand};
pub use trial::{FeaturesCommand, VerifyCommand};

pub(crate) use sidecar::SidecarExtractor;
pub(crate) use util::*;
