pub mod mission;
pub mod swarm;
