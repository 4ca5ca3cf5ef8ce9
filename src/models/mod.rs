pub mod config;
pub mod game;
pub mod outcome;
pub mod player;
pub mod role;
pub mod room;
