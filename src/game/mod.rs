pub mod biome;
pub mod constants;
pub mod events;
pub mod game_loop;
pub mod grid;
pub mod outcome;
pub mod progression;
pub mod round;
pub mod stages;
pub mod systems;
