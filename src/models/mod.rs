// Domain models: snapshots, windows, aggregates and the dashboard payload

mod aggregation;
mod dashboard;
mod sensor;
mod snapshot;
mod window;

pub use aggregation::{AggregateResult, ExtremePoint, GroupExtrema};
pub use dashboard::{
    DashboardUpdate, DisplayExtreme, DisplayValue, GroupSummary, LatestReading, ReadingStatus,
};
pub use sensor::{SensorEndpoint, SensorGroup};
pub use snapshot::{SensorReading, Snapshot};
pub use window::Window;
