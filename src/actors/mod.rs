mod viewer_actor;

pub use viewer_actor::{ViewerActor, ViewerEvent, ViewerHandle, ViewerSummary};
