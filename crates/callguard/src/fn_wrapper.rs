// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a clonable, thread-safe wrapper around a user-provided `Fn`.
///
/// ```rust,ignore
/// define_fn_wrapper!(pub(crate) ErrorMatcher(Fn(error: &(dyn Error + 'static)) -> bool));
/// ```
///
/// The generated type stores the function in an `Arc<dyn Fn ...>` and offers `new` and `call`
/// plus `Clone` and an opaque `Debug`.
macro_rules! define_fn_wrapper {
    ($(#[$meta:meta])* $vis:vis $name:ident(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        $(#[$meta])*
        $vis struct $name(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl $name {
            pub(crate) fn new<F>(func: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(func))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish()
            }
        }
    };
}

pub(crate) use define_fn_wrapper;
