// Library for tests to access modules

pub mod aggregation_engine;
pub mod config;
pub mod history_repo;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod sensor_repo;
pub mod worker;
