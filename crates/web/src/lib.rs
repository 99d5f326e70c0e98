pub mod configuration;
pub mod login;
pub mod middleware;
pub mod responses;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod transport;
