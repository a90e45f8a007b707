pub mod document;
pub mod job;
pub mod log;
pub mod verification;
