pub mod curve;
pub mod mapper;
pub mod visualizer;
