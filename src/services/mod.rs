pub mod ai_service;
pub mod content_service;
pub mod extract_service;
pub mod grading_service;
pub mod prompt_service;
pub mod quiz_service;
pub mod session_service;
