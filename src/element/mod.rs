pub mod emitter;
pub mod scope;
pub mod template;

pub use emitter::{EmittedEvent, EmitterSettings, EventEmitter, Granularity};
pub use scope::{ScopeSettings, SpectrogramScope};
