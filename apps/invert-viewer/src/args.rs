//! Command-line parsing.

use anyhow::{bail, Context};
use invert_app::{AppConfig, UploadStrategy, VertexLayout};

/// What `main` should do.
#[derive(Debug)]
pub enum Command {
    Run(AppConfig),
    Help,
}

/// Parse `args` (without the program name) on top of `config`.
pub fn parse<I>(args: I, mut config: AppConfig) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--shader" => config = config.with_shader_path(value(&mut args, &arg)?),
            "--mesh" => config = config.with_mesh_path(value(&mut args, &arg)?),
            "--staged" => config = config.with_upload(UploadStrategy::Staged),
            "--position-only" => config = config.with_vertex_layout(VertexLayout::Position),
            "--validation" => config = config.with_validation(true),
            "--no-validation" => config = config.with_validation(false),
            "--frames-in-flight" => {
                let raw = value(&mut args, &arg)?;
                let frames: usize = raw
                    .parse()
                    .with_context(|| format!("invalid --frames-in-flight value '{raw}'"))?;
                if frames == 0 {
                    bail!("--frames-in-flight must be at least 1");
                }
                config = config.with_frames_in_flight(frames);
            }
            other => bail!("unknown argument '{other}' (see --help)"),
        }
    }
    Ok(Command::Run(config))
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{flag} expects a value"))
}
