use std::{process::Termination, time::Instant};

use tracing::debug;

use crate::{args, bin_util::MainExit, entry, logging::logging, settings};

pub fn do_main() -> impl Termination {
    let args = args::parse();

    logging(args.log_level, args.json_output);

    let start = Instant::now();

    let result =
        settings::load(args.config.clone()).and_then(|settings| entry::run(args, settings));

    let done = start.elapsed();
    debug!("run time: {done:?}");

    MainExit::new(result, done)
}
