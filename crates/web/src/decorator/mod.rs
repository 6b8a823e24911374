//! Composable wrappers around handlers.
//!
//! A [`Decorator`] turns one value, usually a [`Handler`](edge_http::handler::Handler),
//! into another that wraps it. Decorators chain with [`DecoratorExt::and_then`]:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use edge_web::decorator::{Decorator, DecoratorExt};
//! # use edge_web::forwarded::{ForwardedConfig, ForwardedCustomizer, ForwardedDecorator};
//! # use edge_web::gzip::{GzipConfig, GzipDecorator};
//! # fn build<H: edge_http::handler::Handler>(handler: H) -> Result<(), edge_web::ConfigError> {
//! let customizer = Arc::new(ForwardedCustomizer::new(ForwardedConfig::default())?);
//! let pipeline = DecoratorExt::<H>::and_then(GzipDecorator::new(GzipConfig::default())?, ForwardedDecorator::new(customizer));
//! // requests are customized first, then the response is compressed
//! let handler = pipeline.decorate(handler);
//! # Ok(())
//! # }
//! ```

mod decorator_composer;
mod identity;

pub use decorator_composer::DecoratorComposer;
pub use identity::IdentityDecorator;

pub trait Decorator<In> {
    type Out;

    fn decorate(&self, raw: In) -> Self::Out;
}

pub trait DecoratorExt<In>: Decorator<In> {
    /// Applies `self` first, then `decorator` to the result.
    fn and_then<D>(self, decorator: D) -> DecoratorComposer<Self, D>
    where
        Self: Sized,
    {
        DecoratorComposer::new(self, decorator)
    }

    /// Applies `decorator` first, then `self` to the result.
    fn compose<D>(self, decorator: D) -> DecoratorComposer<D, Self>
    where
        Self: Sized,
    {
        DecoratorComposer::new(decorator, self)
    }
}

impl<T: Decorator<In> + ?Sized, In> DecoratorExt<In> for T {}
