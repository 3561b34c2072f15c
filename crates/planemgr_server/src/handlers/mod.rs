pub mod charts;
pub mod health;

pub use charts::{ChartsState, chart_routes};
pub use health::health_routes;
