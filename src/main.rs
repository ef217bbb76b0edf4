use clap::Parser;
use env_logger::Env;
use index_pin::args::{Args, SubCommand};
use index_pin::build;
use index_pin::container::Container;
use index_pin::errors::*;
use std::env;
use std::io;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(Env::default().default_filter_or(log_level));

    if let Some(path) = args.context {
        debug!("Changing current directory to {path:?}...");
        env::set_current_dir(&path)
            .with_context(|| anyhow!("Failed to switch to directory {path:?}"))?;
    }

    match args.subcommand {
        SubCommand::Build(build) => build::build(&build).await,
        SubCommand::Extract(extract) => {
            let container = Container::create(&extract.image).await?;
            let result: Result<()> = async {
                let buf = container.cat(&extract.path).await?;
                if let Some(output) = &extract.output {
                    fs::write(output, &buf)
                        .await
                        .with_context(|| anyhow!("Failed to write file: {output:?}"))?;
                } else {
                    tokio::io::stdout().write_all(&buf).await?;
                }
                Ok(())
            }
            .await;
            if let Err(err) = container.rm().await {
                warn!("Failed to remove container {:?}: {:#}", container.id, err);
            }
            result
        }
        SubCommand::Completions(completions) => completions.generate(io::stdout()),
    }
}
