use std::{
    io::{self, Write},
    process::{ExitCode, Termination},
    time::Duration,
};

use miette::Report;
use tracing::{debug, error};
use weft::{CompileError, RenderError};

pub enum MainExit {
    Success(Duration),
    Compile(CompileError),
    Render(RenderError),
    Report(Report),
}

impl Termination for MainExit {
    fn report(self) -> ExitCode {
        let code = self.exit_number();
        match self {
            Self::Success(spent) => debug!("Done in {spent:?}"),
            Self::Compile(err) => fatal(Report::new(err)),
            Self::Render(err) => fatal(Report::new(err)),
            Self::Report(err) => fatal(err),
        }
        ExitCode::from(code)
    }
}

fn fatal(err: Report) {
    error!("Fatal error");
    writeln!(io::stderr(), "{err:?}").ok();
}

impl MainExit {
    /// Process exit status: 65 for a bad template, 70 for a compiler bug,
    /// 1 for a failed render and 16 for anything else.
    pub fn exit_number(&self) -> u8 {
        match self {
            Self::Success(_) => 0,
            Self::Compile(CompileError::Syntax(_)) => 65,
            Self::Compile(CompileError::Internal(_)) => 70,
            Self::Render(RenderError::Io(_)) => 16,
            Self::Render(_) => 1,
            Self::Report(_) => 16,
        }
    }

    pub fn new(result: miette::Result<()>, done: Duration) -> Self {
        result.map_or_else(
            |err| {
                err.downcast::<CompileError>()
                    .map(MainExit::Compile)
                    .or_else(|err| err.downcast::<RenderError>().map(MainExit::Render))
                    .unwrap_or_else(MainExit::Report)
            },
            |()| MainExit::Success(done),
        )
    }
}
