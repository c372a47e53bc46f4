pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod geoip;
pub mod pattern;

pub use config::Config;
pub use credential::extract_credential;
pub use error::Error;
pub use gate::{AdmissionGate, AdmissionRequest};
pub use geoip::{GeoIpResolver, NoopGeoIpResolver};
