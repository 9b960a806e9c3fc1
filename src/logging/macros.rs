//! Logging macros that capture the call site
//!
//! `log_to!` writes through an explicit [`Logger`](crate::logging::Logger);
//! the others go through the process-wide logger from
//! [`global`](crate::logging::global). Every macro accepts an optional
//! leading `originator = expr` naming the component that logged.

/// Source location of the macro call site
#[macro_export]
macro_rules! log_location {
    () => {
        $crate::logging::LogLocation::new(file!(), module_path!(), line!())
    };
}

#[macro_export]
macro_rules! log_to {
    ($logger:expr, originator = $orig:expr, $lvl:expr, $code:expr, $($arg:tt)+) => {{
        let __details = format!($($arg)+);
        $logger.log($lvl, $code, &__details, $crate::log_location!(), $orig);
    }};
    ($logger:expr, $lvl:expr, $code:expr, $($arg:tt)+) => {{
        let __details = format!($($arg)+);
        $logger.log($lvl, $code, &__details, $crate::log_location!(), "");
    }};
}

/// Log at any level with a numeric code or a code name
#[macro_export]
macro_rules! botlog {
    (originator = $orig:expr, $lvl:expr, $code:expr, $($arg:tt)+) => {
        $crate::log_to!($crate::logging::global(), originator = $orig, $lvl, $code, $($arg)+)
    };
    ($lvl:expr, $code:expr, $($arg:tt)+) => {
        $crate::log_to!($crate::logging::global(), $lvl, $code, $($arg)+)
    };
}

// ---------------------- LEVELS ----------------------

#[macro_export]
macro_rules! log_debug {
    (originator = $orig:expr, $($arg:tt)+) => {
        $crate::botlog!(originator = $orig, $crate::logging::DEBUG, 0, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::botlog!($crate::logging::DEBUG, 0, $($arg)+)
    };
}

/// Warn on the hardware channel with a code
#[macro_export]
macro_rules! log_warning {
    (originator = $orig:expr, $code:expr, $($arg:tt)+) => {
        $crate::botlog!(originator = $orig, $crate::logging::WARNING, $code, $($arg)+)
    };
    ($code:expr, $($arg:tt)+) => {
        $crate::botlog!($crate::logging::WARNING, $code, $($arg)+)
    };
}

/// Report an error on the hardware channel with a code
#[macro_export]
macro_rules! log_error {
    (originator = $orig:expr, $code:expr, $($arg:tt)+) => {
        $crate::botlog!(originator = $orig, $crate::logging::ERROR, $code, $($arg)+)
    };
    ($code:expr, $($arg:tt)+) => {
        $crate::botlog!($crate::logging::ERROR, $code, $($arg)+)
    };
}
