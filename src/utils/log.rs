// utils/log.rs

use std::{
    collections::VecDeque,
    fs::{
        self,
        File,
    },
    io::{
        self,
        BufRead,
        BufReader,
        BufWriter,
        ErrorKind,
        Write,
    },
    path::Path,
    str::FromStr,
    sync::OnceLock,
};

use tempfile::NamedTempFile;
use tracing::{
    debug,
    error,
    level_filters::LevelFilter,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        time,
        writer::{
            BoxMakeWriter,
            MakeWriterExt,
        },
    },
};

use crate::config::Config;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Crates that are too chatty below warn
const QUIET: &[&str] = &["hyper=warn", "hyper_util=warn", "tower_http=warn", "mio=warn"];

/// # Trims a log file until it's under a maximum size
///
/// Trimming means deleting lines from the top of the file
///
/// # Arguments
/// * `path`        - The path to the log file to be trimmed
/// * `max_size`    - The maximum size of the log file, in bytes
///
/// # Returns
/// Bytes trimmed
///
/// # Errors
/// - Log file does not exist (`NotFound` should be handled when called)
/// - Other I/O errors
pub fn trim_log<P: AsRef<Path>>(path: P, max_size: u64) -> io::Result<u64> {
    let path = path.as_ref();
    let size = fs::metadata(path)?.len();

    if size <= max_size {
        return Ok(0);
    }

    let reader = BufReader::new(File::open(path)?);

    let mut lines = VecDeque::new();
    let mut total_size = 0;

    for line in reader.lines() {
        let line = line?;
        let line_size = (line.len() + 1) as u64; // account for \n

        total_size += line_size;
        lines.push_back((line, line_size));

        while total_size > max_size {
            match lines.pop_front() {
                | Some((_, removed_size)) => total_size -= removed_size,
                | None => break,
            }
        }
    }

    let dir = match path.parent() {
        | Some(p) if !p.as_os_str().is_empty() => p,
        | _ => Path::new("."),
    };

    // Keep the temp file next to the log so persisting is a rename on the same filesystem
    let mut temp_file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&mut temp_file);
        for (line, _) in &lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
    }

    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(size - total_size)
}

fn log(config: &Config) {
    let dir = match config.log_file.parent() {
        | Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        | _ => ".".into(),
    };
    let file = config
        .log_file
        .file_name()
        .map_or_else(|| "reelbox.log".into(), |f| f.to_os_string());

    let (file_writer, guard) = tracing_appender::non_blocking(rolling::never(dir, file));

    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::INFO);
    let mut filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var("LOG_LEVEL")
        .from_env_lossy();
    for directive in QUIET {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    let writer = if config.log_to_console {
        BoxMakeWriter::new(file_writer.and(io::stdout))
    } else {
        BoxMakeWriter::new(file_writer)
    };

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_target(true)
        .with_line_number(true)
        .with_timer(time::uptime())
        .with_writer(writer)
        .compact()
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }

    if LOG_GUARD.set(guard).is_err() {
        eprintln!("The log() function was called more than once.");
        eprintln!("Please report this as a bug.");
    }
}

/// # Initialize logging
///
/// This function wraps all the logging setup, including trimming. The log is trimmed before the
/// appender opens it.
pub fn init(config: &Config) {
    let trimmed = trim_log(&config.log_file, config.log_max_size);
    log(config);

    match trimmed {
        | Ok(b) => debug!("Trimmed {b} bytes from log file"),
        | Err(e) if e.kind() == ErrorKind::NotFound => {},
        | Err(e) => error!("Failed to trim bytes from log file: {e}"),
    }
}
