use std::{io, iter::repeat};

use log::{LevelFilter, STATIC_MAX_LEVEL};
use supports_color::{on as supports_color_on_stream, Stream::Stderr};
use tracing::{subscriber::set_global_default, Subscriber};
use tracing_log::AsTrace;
use tracing_subscriber::{filter::targets::Targets, fmt::fmt, layer::SubscriberExt};

/// Installs the global subscriber.
///
/// Logs go to stderr so they never mix with rendered output on stdout.
pub fn logging(log_level: LevelFilter, json_output: bool) {
    let log_level = log_level.min(STATIC_MAX_LEVEL);

    let allowed_targets = (log_level != LevelFilter::Trace).then_some(["weft", "weft_cli"]);

    let log_level = log_level.as_trace();
    let subscriber_builder = fmt().with_max_level(log_level).with_writer(io::stderr);

    let subscriber: Box<dyn Subscriber + Send + Sync> = if json_output {
        Box::new(subscriber_builder.json().finish())
    } else {
        // Disable time, target, file, line_num, thread name/ids to make the
        // output more readable
        let subscriber_builder = subscriber_builder
            .without_time()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_names(false)
            .with_thread_ids(false);

        let stderr_supports_color = supports_color_on_stream(Stderr)
            .map(|color_level| color_level.has_basic)
            .unwrap_or_default();

        Box::new(subscriber_builder.with_ansi(stderr_supports_color).finish())
    };

    let filter_layer = allowed_targets.map(|allowed_targets| {
        Targets::new().with_targets(allowed_targets.into_iter().zip(repeat(log_level)))
    });

    let subscriber = subscriber.with(filter_layer);

    if let Err(err) = set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {err}");
    }
}
