pub mod contract;
pub mod cost;
pub mod recommendation;
pub mod timestamp;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
