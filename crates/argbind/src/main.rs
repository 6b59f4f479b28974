mod fixture;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use argbind_core::{ParameterDescriptor, ParameterResolver, RequestContext, Value};
use argbind_rt::error::error_json;
use serde_json::Value as JsonValue;

use crate::fixture::{CliError, Fixture};

const USAGE: &str = r#"usage: argbind [resolve] <fixture.toml>

commands:
  resolve   Bind the fixture's parameters against its request (default)

options:
  -h, --help      Print this help
  -V, --version   Print the version

environment:
  ARGBIND_LOG                 Log filter (1 = debug, default warn)
  ARGBIND_LOOKUP_ORDER        Field sources, e.g. form,query,headers
  ARGBIND_TRIM_VALUES         Trim raw field values (default on)
  ARGBIND_SPLIT_ARRAY_VALUES  Split single array fields on commas (default off)
"#;

const EXIT_BIND_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

enum Command {
    Help,
    Version,
    Resolve(PathBuf),
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let code = run(args);
    std::process::exit(code);
}

fn run(args: Vec<String>) -> i32 {
    argbind_rt::log::init();
    let path = match parse_args(&args) {
        Ok(Command::Help) => {
            print!("{USAGE}");
            return 0;
        }
        Ok(Command::Version) => {
            println!("argbind {}", env!("CARGO_PKG_VERSION"));
            return 0;
        }
        Ok(Command::Resolve(path)) => path,
        Err(err) => {
            eprintln!("error: {err}");
            eprint!("{USAGE}");
            return EXIT_USAGE;
        }
    };

    let (resolver, ctx, params) = match prepare(&path) {
        Ok(parts) => parts,
        Err(err) => {
            eprintln!("{}", error_json("fixture_error", &err.to_string(), None));
            return EXIT_USAGE;
        }
    };
    match resolver.resolve_all(&ctx, &params) {
        Ok(values) => {
            let out = JsonValue::Array(values.iter().map(Value::to_json).collect());
            println!("{out}");
            0
        }
        Err(err) => {
            tracing::debug!(code = err.code(), param = err.param(), "binding failed");
            eprintln!("{}", err.to_json());
            EXIT_BIND_ERROR
        }
    }
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut rest = args;
    if let Some(first) = rest.first() {
        match first.as_str() {
            "-h" | "--help" | "help" => return Ok(Command::Help),
            "-V" | "--version" => return Ok(Command::Version),
            "resolve" => rest = &rest[1..],
            _ => {}
        }
    }
    match rest {
        [] => Err("missing fixture path".to_string()),
        [path] if path.starts_with('-') => Err(format!("unknown option: {path}")),
        [path] => Ok(Command::Resolve(PathBuf::from(path))),
        [_, extra, ..] => Err(format!("unexpected argument: {extra}")),
    }
}

type Prepared = (
    ParameterResolver<'static>,
    Arc<RequestContext>,
    Vec<ParameterDescriptor>,
);

fn prepare(path: &Path) -> Result<Prepared, CliError> {
    let fixture = Fixture::load(path)?;
    let options = fixture.options(|key| env::var(key).ok())?;
    fixture.register_converters()?;
    let ctx = fixture.request_context()?;
    let params = fixture.parameters()?;
    tracing::debug!(fixture = %path.display(), params = params.len(), "fixture loaded");
    Ok((ParameterResolver::with_options(options), ctx, params))
}
