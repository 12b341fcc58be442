pub mod anomaly;
pub mod flow;
pub mod frame_stats;
pub mod series;
pub mod window;
