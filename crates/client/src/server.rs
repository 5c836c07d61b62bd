use crate::transport::{CallOptions, FlightClient};
use std::sync::Arc;

/// A connection to a Barrage server: the Flight client plus the headers
/// attached to every call.
pub struct Server {
    flight: Arc<dyn FlightClient>,
    headers: Vec<(String, String)>,
}

impl Server {
    pub fn new(flight: Arc<dyn FlightClient>, headers: Vec<(String, String)>) -> Self {
        Self { flight, headers }
    }

    pub fn flight_client(&self) -> &Arc<dyn FlightClient> {
        &self.flight
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            headers: self.headers.clone(),
        }
    }
}
