mod api_server;

pub use api_server::{
    client_ip, ApiServer, ApiState, FailureResponse, HealthResponse, LocationResponse, LookupQuery,
};
