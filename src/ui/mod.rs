pub mod bridge;
pub mod gate;
pub mod notify;
pub mod render;
