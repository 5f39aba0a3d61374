//! Small [`tower`] helpers shared by the forma service stacks.

use std::pin::Pin;

use futures::Future;

pub mod service;

/// Boxed, sendable future returned by every forma middleware.
pub type ResponseFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
