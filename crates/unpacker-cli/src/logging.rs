use nu_ansi_term::Color::{Blue, Cyan, DarkGray, Magenta, Red, Yellow};
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    registry::LookupSpan,
};

use crate::{cli::Args, utils::Colored};

/// Fields of a pipeline event. Transcript lines carry `op_id`; stage changes
/// also carry `stage`.
#[derive(Default)]
struct PipelineFields {
    message: Option<String>,
    op_id: Option<u64>,
    stage: Option<String>,
}

impl Visit for PipelineFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "op_id" {
            self.op_id = Some(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            "stage" => self.stage = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

/// Splits the `[HH:MM:SS] ` stamp off a transcript line.
fn split_stamp(line: &str) -> (Option<&str>, &str) {
    let Some((stamp, rest)) = line.strip_prefix('[').and_then(|l| l.split_once("] ")) else {
        return (None, line);
    };
    let is_clock = stamp.len() == 8 && stamp.chars().all(|c| c.is_ascii_digit() || c == ':');
    if is_clock {
        (Some(stamp), rest)
    } else {
        (None, line)
    }
}

fn render(level: Level, fields: &PipelineFields) -> String {
    let mut out = match level {
        Level::TRACE => format!("{} ", Colored(Magenta, "[TRACE]")),
        Level::DEBUG => format!("{} ", Colored(Blue, "[DEBUG]")),
        Level::INFO => String::new(),
        Level::WARN => format!("{} ", Colored(Yellow, "[WARN]")),
        Level::ERROR => format!("{} ", Colored(Red, "[ERROR]")),
    };

    let (stamp, message) = split_stamp(fields.message.as_deref().unwrap_or_default());
    if let Some(stamp) = stamp {
        out.push_str(&format!("{} ", Colored(DarkGray, stamp)));
    }
    if let Some(stage) = &fields.stage {
        out.push_str(&format!("{} ", Colored(Cyan, format!("{stage}:"))));
    }
    out.push_str(message);

    // several operations can interleave at debug level
    if level >= Level::DEBUG {
        if let Some(op_id) = fields.op_id {
            out.push_str(&format!(" {}", Colored(DarkGray, format!("(op {op_id})"))));
        }
    }
    out
}

pub struct PipelineFormatter;

impl<S, N> FormatEvent<S, N> for PipelineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut fields = PipelineFields::default();
        event.record(&mut fields);
        writeln!(writer, "{}", render(*event.metadata().level(), &fields))
    }
}

/// Routes transcript lines (`INFO`) to stdout and diagnostics to stderr.
struct Terminal;

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Collects one formatted event, then prints it in a single piece while the
/// spinners are hidden.
struct SuspendingWriter {
    buffer: Vec<u8>,
    stream: Stream,
}

impl std::io::Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for SuspendingWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buffer);
        let text = text.trim_end_matches('\n');
        if text.is_empty() {
            return;
        }

        crate::progress::suspend(|| {
            match self.stream {
                Stream::Stdout => println!("{text}"),
                Stream::Stderr => eprintln!("{text}"),
            }
        });
    }
}

impl<'a> MakeWriter<'a> for Terminal {
    type Writer = SuspendingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendingWriter {
            buffer: Vec::new(),
            stream: Stream::Stdout,
        }
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        let stream = if *meta.level() == Level::INFO {
            Stream::Stdout
        } else {
            Stream::Stderr
        };
        SuspendingWriter {
            buffer: Vec::new(),
            stream,
        }
    }
}

/// Filter directives for the requested verbosity. Library crates stay at
/// `warn` unless `-v` is given, since the transcript already narrates them.
fn filter_directives(args: &Args) -> String {
    let level = if args.quiet {
        Level::ERROR
    } else if args.verbose >= 2 {
        Level::TRACE
    } else if args.verbose == 1 {
        Level::DEBUG
    } else {
        Level::INFO
    };

    if args.verbose == 0 && !args.quiet {
        format!("unpacker=warn,unpacker_cli={level}")
    } else {
        format!("unpacker={level}")
    }
}

pub fn setup_logging(args: &Args) {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter_directives(args))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(Terminal)
        .compact()
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if args.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.event_format(PipelineFormatter).finish())
    };

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {err}");
    }
}
