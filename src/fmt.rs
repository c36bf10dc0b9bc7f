#![macro_use]
#![allow(unused_macros)]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("You may not enable both `defmt` and `log` features.");

/// defmt has no log targets and needs a literal format string, so records are
/// rendered with `core::fmt` and handed over as one argument.
#[cfg(feature = "defmt")]
macro_rules! defmt_record {
    ($level:ident, target: $target:expr, $($arg:tt)+) => {{
        let _ = $target;
        ::defmt::$level!("{}", ::defmt::Display2Format(&::core::format_args!($($arg)+)));
    }};
    ($level:ident, $($arg:tt)+) => {
        ::defmt::$level!("{}", ::defmt::Display2Format(&::core::format_args!($($arg)+)))
    };
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! discard_record {
    (target: $target:expr, $($arg:tt)+) => {{
        let _ = $target;
        let _ = ::core::format_args!($($arg)+);
    }};
    ($($arg:tt)+) => {{
        let _ = ::core::format_args!($($arg)+);
    }};
}

macro_rules! trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::trace!($($arg)+);
        #[cfg(feature = "defmt")]
        defmt_record!(trace, $($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        discard_record!($($arg)+);
    }};
}

macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::debug!($($arg)+);
        #[cfg(feature = "defmt")]
        defmt_record!(debug, $($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        discard_record!($($arg)+);
    }};
}

macro_rules! info {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::info!($($arg)+);
        #[cfg(feature = "defmt")]
        defmt_record!(info, $($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        discard_record!($($arg)+);
    }};
}

macro_rules! warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::warn!($($arg)+);
        #[cfg(feature = "defmt")]
        defmt_record!(warn, $($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        discard_record!($($arg)+);
    }};
}

macro_rules! error {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::error!($($arg)+);
        #[cfg(feature = "defmt")]
        defmt_record!(error, $($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        discard_record!($($arg)+);
    }};
}

/// Protocol trace, emitted only while the driver's [`LogConfig`] has verbose
/// output enabled. The record goes to the configured log target.
///
/// [`LogConfig`]: crate::config::LogConfig
macro_rules! verbose {
    ($log:expr, $($arg:tt)+) => {
        if $log.is_verbose() {
            debug!(target: $log.target(), $($arg)+);
        }
    };
}

/// Lossy view of raw modem bytes for log output.
pub(crate) struct LossyStr<'a>(pub &'a [u8]);

impl core::fmt::Debug for LossyStr<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.0) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}
