/// Logs through a `Context` at the given slog level, if a logger is attached.
#[macro_export]
macro_rules! try_log_at {
    ($level:ident, $ctx:expr, $($args:tt)+) => {
        $ctx.try_log(|l| $level!(l, $($args)+))
    };
}

#[macro_export]
macro_rules! try_info {
    ($ctx:expr, $($args:tt)+) => {
        $crate::try_log_at!(info, $ctx, $($args)+)
    };
}

#[macro_export]
macro_rules! try_debug {
    ($ctx:expr, $($args:tt)+) => {
        $crate::try_log_at!(debug, $ctx, $($args)+)
    };
}

#[macro_export]
macro_rules! try_warn {
    ($ctx:expr, $($args:tt)+) => {
        $crate::try_log_at!(warn, $ctx, $($args)+)
    };
}

#[macro_export]
macro_rules! try_error {
    ($ctx:expr, $($args:tt)+) => {
        $crate::try_log_at!(error, $ctx, $($args)+)
    };
}
