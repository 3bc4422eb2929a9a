pub mod containerized;
pub mod simulated;

pub use containerized::ContainerizedStrategy;
pub use simulated::SimulatedStrategy;
