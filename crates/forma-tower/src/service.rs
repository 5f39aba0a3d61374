use tower::Service;

/// Takes the service that was just driven to readiness and leaves a fresh
/// clone in its place.
///
/// The returned service is the one that must be `call`ed; the clone left
/// behind has not been polled yet.
pub fn take_ready_service<S, T>(src: &mut S) -> S
where
    S: Service<T> + Clone,
{
    let clone = src.clone();
    std::mem::replace(src, clone)
}
