//! Argument tuples accepted by factories.
//!
//! There is exactly one generic registration primitive and one generic
//! resolution primitive; both are parameterized over an [`Arguments`]
//! tuple. The impls below stamp the trait out for arities zero through
//! nine, so callers pass `("url".to_string(), 5432u16)` rather than going
//! through one hand-written method per argument count.

mod sealed {
    pub trait Sealed {}
}

/// Extra values forwarded to a factory at resolution time.
///
/// Implemented for tuples of zero through nine `Clone + Send + Sync`
/// values. `Clone` is required because deferred wrappers may replay the
/// same resolution more than once.
pub trait Arguments: sealed::Sealed + Clone + Send + Sync + 'static {}

macro_rules! arguments_for_tuple {
    ($($arg:ident),*) => {
        impl<$($arg: Clone + Send + Sync + 'static),*> sealed::Sealed for ($($arg,)*) {}
        impl<$($arg: Clone + Send + Sync + 'static),*> Arguments for ($($arg,)*) {}
    };
}

arguments_for_tuple!();
arguments_for_tuple!(A1);
arguments_for_tuple!(A1, A2);
arguments_for_tuple!(A1, A2, A3);
arguments_for_tuple!(A1, A2, A3, A4);
arguments_for_tuple!(A1, A2, A3, A4, A5);
arguments_for_tuple!(A1, A2, A3, A4, A5, A6);
arguments_for_tuple!(A1, A2, A3, A4, A5, A6, A7);
arguments_for_tuple!(A1, A2, A3, A4, A5, A6, A7, A8);
arguments_for_tuple!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
