pub mod models;
pub mod play;
