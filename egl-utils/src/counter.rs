//! A macro for declaring atomically-generated fresh identifiers, used
//! wherever the compiler needs a monotonically increasing id that is cheap
//! to hand out from behind a shared reference (e.g. block and local ids
//! before the containing function body is finished).

/// Declare a newtype wrapping a `u32` that can mint fresh, process-unique
/// values via an atomic counter.
#[macro_export]
macro_rules! counter {
    ($(#[$meta:meta])* $vis:vis struct $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name(u32);

        impl $name {
            /// Create a fresh, process-unique instance.
            pub fn new() -> Self {
                static COUNTER: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);
                Self(COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

counter! {
    /// Identifies one compilation run, used to scope process-wide registry
    /// state and guarantee teardown between runs never leaks into the next.
    pub struct CompilationId
}
