pub mod collision;
pub mod food;
pub mod movement;
