//! Internal log forwarding.
//!
//! Hardware builds log through `defmt`, host builds through `tracing`. With
//! neither feature enabled the arguments are still evaluated by reference so
//! call sites do not trip `unused_variables`.
//!
//! Only plain `{}` placeholders are used so the same format string is valid
//! for both backends.

macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::debug!($fmt $(, $arg)*);
        #[cfg(feature = "tracing")]
        tracing::debug!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($fmt $(, $arg)*);
        #[cfg(feature = "tracing")]
        tracing::warn!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
