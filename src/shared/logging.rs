use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Once;

use chrono::Utc;

use crate::shared::config::{self, LogFormat, LogMode};

static INIT: Once = Once::new();

/// Gateway logs at info; HTTP/websocket plumbing only when it warns.
const DEFAULT_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn,tungstenite=warn";

/// `"[stream] session=.. started"` -> `(Some("stream"), "session=.. started")`.
fn split_component(msg: &str) -> (Option<&str>, &str) {
    let Some(rest) = msg.strip_prefix('[') else {
        return (None, msg);
    };
    match rest.split_once(']') {
        Some((component, tail))
            if !component.is_empty()
                && component
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
        {
            (Some(component), tail.trim_start())
        }
        _ => (None, msg),
    }
}

/// Initializes the global logger once from `config::logging_config()`.
///
/// Output is plain text (`ts level target msg`) or one JSON object per line,
/// written to stdout or appended to `<LOG_DIR>/<LOG_FILE_NAME>`. Problems
/// opening the log file fall back to stdout and are reported as warnings
/// after the logger is installed. JSON lines split the `[component]` prefix
/// (`[webhook]`, `[stream]`, `[handoff]`, ...) into a `component` field.
/// `RUST_LOG` overrides the default filter. Safe to call more than once.
pub fn init() {
    INIT.call_once(|| {
        let mut init_warnings = Vec::new();
        let cfg = config::logging_config().clone();
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER));

        builder.format(move |buf, record| {
            let ts = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            match cfg.format {
                LogFormat::Json => {
                    let text = record.args().to_string();
                    let (component, msg) = split_component(&text);
                    let obj = serde_json::json!({
                        "ts": ts,
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "component": component,
                        "msg": msg,
                    });
                    writeln!(buf, "{}", obj)
                }
                LogFormat::Text => writeln!(
                    buf,
                    "{} {} {} {}",
                    ts,
                    record.level(),
                    record.target(),
                    record.args()
                ),
            }
        });

        match (&cfg.mode, cfg.dir.as_ref()) {
            (LogMode::File, Some(dir)) => {
                if let Err(err) = std::fs::create_dir_all(dir) {
                    init_warnings.push(format!("[logging] failed to create log dir: {}", err));
                }
                let path = std::path::Path::new(dir).join(&cfg.file_name);
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => {
                        builder.target(env_logger::Target::Pipe(Box::new(file)));
                    }
                    Err(err) => {
                        init_warnings.push(format!(
                            "[logging] failed to open log file ({}): {}",
                            path.display(),
                            err
                        ));
                        builder.target(env_logger::Target::Stdout);
                    }
                }
            }
            _ => {
                builder.target(env_logger::Target::Stdout);
            }
        }

        let _ = builder.try_init();
        for warning in init_warnings {
            log::warn!("{}", warning);
        }
    });
}
