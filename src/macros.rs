// Developer tracing, silent unless LMDESK_DEBUG is set.

macro_rules! debug_eprintln {
    ($($arg:tt)*) => {
        if std::env::var("LMDESK_DEBUG").is_ok() {
            eprintln!($($arg)*);
        }
    };
}
