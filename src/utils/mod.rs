pub mod permissions;
pub mod systemd;

// Условное логирование, чтобы не собирать аргументы на горячем пути
#[macro_export]
macro_rules! debug_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}
