pub mod flow;
pub mod membership;
pub mod reaper;
pub mod session;
pub mod submission;
