pub mod refresher;
pub mod scheduler;
pub mod upstream;
