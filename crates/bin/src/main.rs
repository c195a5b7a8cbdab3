use std::process::Termination;

use weft_cli::do_main;

fn main() -> impl Termination {
    do_main()
}
