/// Macros for properly formatted console logging.
///
/// On wasm32 these wrap `gloo_console` and prefix every message with the
/// browser clock. On native targets (tests, tooling) they forward to `tracing`,
/// since calling a JS import outside the browser aborts the process.
#[macro_export]
macro_rules! console_info {
    ($fmt:expr) => {
        $crate::__console_emit!(info, format!("{}", $fmt))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::__console_emit!(info, format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! console_warn {
    ($fmt:expr) => {
        $crate::__console_emit!(warn, format!("{}", $fmt))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::__console_emit!(warn, format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! console_error {
    ($fmt:expr) => {
        $crate::__console_emit!(error, format!("{}", $fmt))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::__console_emit!(error, format!($fmt, $($arg)*))
    };
}

#[doc(hidden)]
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! __console_emit {
    (info, $msg:expr) => {
        gloo_console::info!(format!("[{}] {}", js_sys::Date::now(), $msg))
    };
    (warn, $msg:expr) => {
        gloo_console::warn!(format!("[{}] {}", js_sys::Date::now(), $msg))
    };
    (error, $msg:expr) => {
        gloo_console::error!(format!("[{}] {}", js_sys::Date::now(), $msg))
    };
}

#[doc(hidden)]
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! __console_emit {
    (info, $msg:expr) => {
        tracing::info!(target: "console", "{}", $msg)
    };
    (warn, $msg:expr) => {
        tracing::warn!(target: "console", "{}", $msg)
    };
    (error, $msg:expr) => {
        tracing::error!(target: "console", "{}", $msg)
    };
}
