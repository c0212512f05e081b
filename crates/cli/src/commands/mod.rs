pub mod dump;
pub mod events;
