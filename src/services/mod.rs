pub mod endgame;
pub mod game_service;
pub mod resolver;
pub mod room_service;
pub mod setup_service;
