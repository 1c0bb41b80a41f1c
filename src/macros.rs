//! Internal and exported macros.

/// Emits a `tracing` event when the `tracing` feature is enabled and expands
/// to nothing otherwise.
macro_rules! trace_event {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        {
            ::tracing::$level!($($arg)+);
        }
    }};
}

/// Implements [`Derived`](crate::Derived) for a concrete type.
///
/// Two forms are supported:
///
/// - `derived!(Circle => dyn Shape)`: the base is a trait object implemented by
///   the derived type.
/// - `derived!(Doo => Foo, base)`: the base is stored in the named field of the
///   derived type.
///
/// ```rust
/// use threadsafe::derived;
///
/// trait Shape {
///     fn area(&self) -> f64;
/// }
///
/// struct Square(f64);
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.0 * self.0
///     }
/// }
///
/// struct Foo {
///     x: i32,
/// }
///
/// struct Doo {
///     base: Foo,
///     y: i32,
/// }
///
/// derived!(Square => dyn Shape);
/// derived!(Doo => Foo, base);
/// ```
#[macro_export]
macro_rules! derived {
    ($derived:ty => dyn $($base:tt)+) => {
        // SAFETY: unsizing coercion keeps the address and provenance of `this`.
        unsafe impl $crate::Derived<dyn $($base)+> for $derived {
            #[inline]
            fn upcast(this: *mut Self) -> *mut (dyn $($base)+) {
                this
            }
        }
    };
    ($derived:ty => $base:ty, $field:ident) => {
        // SAFETY: the projection stays inside the allocation `this` points to.
        unsafe impl $crate::Derived<$base> for $derived {
            #[inline]
            fn upcast(this: *mut Self) -> *mut $base {
                unsafe { ::core::ptr::addr_of_mut!((*this).$field) }
            }
        }
    };
}
