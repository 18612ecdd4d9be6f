//! client-side (_initiator_) main loop and supporting structures
// (c) 2024 Ross Younger

mod budget;
mod engine;
mod job;
mod main_loop;
mod options;
mod progress;
mod sequencer;

pub use budget::AttemptBudget;
pub use engine::{Engine, EngineError, EngineStats, RetransmitPolicy};
pub use job::{FileSpec, UploadJob};
#[allow(clippy::module_name_repetitions)]
pub use main_loop::client_main;
pub use options::Parameters;
pub(crate) use progress::MAX_UPDATE_FPS;
pub use sequencer::{Phase, UploadError, UploadReport, upload};
