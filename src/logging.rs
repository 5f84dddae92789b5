use std::fmt::Display;

use log::LevelFilter;

/// Maps repeated `-v` flags to a default log filter.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize the logging system. `RUST_LOG` overrides the verbosity level.
pub fn init_logging(verbosity: u8) {
    let default = level_for_verbosity(verbosity).to_string().to_lowercase();
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
    if result.is_err() {
        eprintln!("Warning: Logging system already initialized");
    }
}

/// Result extension for convenient error logging
pub trait ResultExt<T, E> {
    fn log_error(self, context: Option<&str>) -> Self;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    fn log_error(self, context: Option<&str>) -> Self {
        if let Err(ref error) = self {
            match context {
                Some(context) => log::error!("{context}: {error:#}"),
                None => log::error!("{error:#}"),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_verbosity_count_when_mapping_then_level_increases() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_for_verbosity(1), LevelFilter::Info);
        assert_eq!(level_for_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn given_error_result_when_logging_then_result_is_passed_through() {
        let result: Result<(), String> = Err("boom".into());

        assert_eq!(result.clone().log_error(Some("convert")), result);
    }
}
