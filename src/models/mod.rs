pub mod question;
pub mod score;
pub mod session;
pub mod subject;
