pub mod destinations;
pub mod moments;
pub mod steps;
