pub mod constants;
pub mod entity;
pub mod game_loop;
pub mod intent_buffer;
pub mod performance;
pub mod spatial;
pub mod state;
pub mod systems;
