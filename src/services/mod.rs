/// Service layer for the inbox client.
/// Async orchestration over the REST client and local state.

pub mod messenger;
pub mod refresher;

pub use messenger::Messenger;
pub use refresher::Refresher;
