use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
};

use itertools::Itertools;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use tracing::{debug, info};
use weft::{Context, Dots, Template, Value};

use crate::{args::Args, settings::Settings};

/// Compiles the template named by `args` and renders it to stdout.
pub fn run(args: Args, settings: Settings) -> Result<()> {
    let text = read_template(&args.template)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&args, &settings, &text, &mut out)?;
    out.flush().into_diagnostic()
}

fn execute(args: &Args, settings: &Settings, text: &str, out: &mut dyn Write) -> Result<()> {
    let template = Template::with_contexts(text, settings.contexts())?;
    info!(
        vars = %template.free_vars().join(", "),
        "compiled {}",
        args.template.display()
    );

    if args.emit_code {
        return writeln!(out, "{}", template.code()).into_diagnostic();
    }

    if args.list_vars {
        for name in template.free_vars() {
            writeln!(out, "{name}").into_diagnostic()?;
        }
        return Ok(());
    }

    let mut values = Context::new();
    for path in &args.contexts {
        values.extend(load_context(path)?);
    }
    values.extend(args.vars.iter().cloned());
    debug!(keys = %values.keys().join(", "), "render values");

    template.render_into(out, &values, &Dots)?;
    Ok(())
}

fn read_template(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .into_diagnostic()
            .wrap_err("read template from stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("read template {}", path.display()))
    }
}

fn load_context(path: &Path) -> Result<Context> {
    let contents = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("read context {}", path.display()))?;

    let json: serde_json::Value = serde_json::from_str(&contents)
        .into_diagnostic()
        .wrap_err_with(|| format!("parse context {}", path.display()))?;

    match json {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect()),
        other => Err(miette!(
            "context {} must hold a JSON object, found {other}",
            path.display()
        )),
    }
}
