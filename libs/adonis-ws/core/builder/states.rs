/// Type-state markers for the builder pattern
///
/// These types are used to track which fields have been set
/// in the builder at compile-time, preventing invalid configurations.

use std::marker::PhantomData;

/// Marker trait for URL state
pub trait UrlState {}

/// URL has not been set
pub struct NoUrl;
impl UrlState for NoUrl {}

/// URL has been set
pub struct HasUrl;
impl UrlState for HasUrl {}

/// Marker trait for transport state
pub trait TransportState {}

/// No transport given; `build` falls back to tokio-tungstenite
pub struct DefaultTransport;
impl TransportState for DefaultTransport {}

/// A custom transport has been set
pub struct CustomTransport;
impl TransportState for CustomTransport {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<U, T> {
    _url: PhantomData<U>,
    _transport: PhantomData<T>,
}

impl<U, T> TypeState<U, T> {
    pub(crate) fn new() -> Self {
        Self {
            _url: PhantomData,
            _transport: PhantomData,
        }
    }
}

impl<U, T> Default for TypeState<U, T> {
    fn default() -> Self {
        Self::new()
    }
}
