/*!
  Debug logging macros. These forward to the `log` facade, so they are
  no-ops unless the host application installs a logger. Nothing in the hot
  scan loop logs.
*/

/// Log a compile-phase event at debug level.
#[macro_export]
macro_rules! debug_log {
  ($($arg:tt)*) => {
    log::debug!($($arg)*)
  };
}

/// Log fine-grained construction detail at trace level.
#[macro_export]
macro_rules! trace_log {
  ($($arg:tt)*) => {
    log::trace!($($arg)*)
  };
}
