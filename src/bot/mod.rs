pub mod inbound;
pub mod membership;
pub mod messenger;
pub mod ui;
