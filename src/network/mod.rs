mod grpc_transport;
mod in_process;
mod resolver;
mod rest;
mod transport;

pub use grpc_transport::GrpcTransport;
pub use in_process::InProcessTransport;
pub use resolver::{LeaderResolver, ResolveError, StaticLeaderResolver};
pub use rest::{decode_path_segment, encode_path_segment, RestRequest, RestResponse, RestVerb};
pub use transport::{Transport, TransportError};
