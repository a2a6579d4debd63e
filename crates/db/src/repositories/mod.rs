mod document_repository;
mod event_repository;
mod session_repository;

pub use document_repository::DocumentRepository;
pub use event_repository::EventRepository;
pub use session_repository::SessionRepository;

/// Session statuses that may never be overwritten once stored.
pub(crate) const TERMINAL_STATUSES: &str = "('completed', 'stopped', 'error')";
