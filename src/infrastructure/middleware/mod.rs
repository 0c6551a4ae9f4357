// Request-scoped actor resolution for the HTTP layer

pub mod actor_extractor;
pub mod actor_middleware;

pub use actor_extractor::CurrentActor;
pub use actor_middleware::{actor_middleware, resolve_actor};
