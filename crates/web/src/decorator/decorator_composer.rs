use crate::decorator::{Decorator, IdentityDecorator};

/// Two decorators applied in sequence, `first` innermost.
#[derive(Debug, Clone)]
pub struct DecoratorComposer<D1, D2> {
    first: D1,
    second: D2,
}

impl<D1, D2> DecoratorComposer<D1, D2> {
    pub fn new(first: D1, second: D2) -> Self {
        Self { first, second }
    }
}

impl Default for DecoratorComposer<IdentityDecorator, IdentityDecorator> {
    fn default() -> Self {
        Self::new(IdentityDecorator, IdentityDecorator)
    }
}

impl<In, D1, D2> Decorator<In> for DecoratorComposer<D1, D2>
where
    D1: Decorator<In>,
    D2: Decorator<D1::Out>,
{
    type Out = D2::Out;

    fn decorate(&self, raw: In) -> Self::Out {
        self.second.decorate(self.first.decorate(raw))
    }
}
