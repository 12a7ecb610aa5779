use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialise tracing. Filter comes from SEMANTICA_LOG (default
/// "info"). With `log_to_file`, output goes to a daily-rolled file
/// under the platform data dir instead of stderr; the returned guard
/// must stay alive for the process lifetime.
pub fn init_logging(log_to_file: bool) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env("SEMANTICA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  if log_to_file {
    let log_dir = dirs::data_local_dir()
      .unwrap_or_else(std::env::temp_dir)
      .join("semantica")
      .join("logs");
    let _ = std::fs::create_dir_all(&log_dir);

    let appender = tracing_appender::rolling::daily(log_dir, "semantica.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_ansi(false)
      .init();

    Some(guard)
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();

    None
  }
}
