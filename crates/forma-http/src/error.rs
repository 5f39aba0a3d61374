/// Failures raised while moving a request over the wire.
///
/// Everything here is a transport problem. HTTP status codes, including
/// 401, are successful responses at this layer and are interpreted by
/// whoever sits above the transport.
#[derive(thiserror::Error, Debug)]
pub enum HttpServiceError {
    #[error("Invalid HTTP request: {:?}", .0)]
    Http(#[from] http::Error),
    #[error("Request timed out")]
    TimedOut,
    #[error("Could not connect: {:?}", .0)]
    Connect(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("Could not read body: {:?}", .0)]
    Body(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("Decode error: {:?}", .0)]
    Decode(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("Unexpected HTTP error: {:?}", .0)]
    Unexpected(Box<dyn std::error::Error + Send + Sync + 'static>),
}
