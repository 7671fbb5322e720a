use std::{path::Path, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use logging::setup_logging;
use progress::{spawn_event_handler, ProgressGuard};
use tracing::{debug, info, warn};
use unpacker_config::config::{self, config_path, generate_default_config, get_config, set_config_path};
use unpacker_core::UnpackerResult;
use unpacker_events::{ChannelSink, EventSinkHandle};
use unpacker_operations::{InstallOptions, InstalledTo, Unpacker};
use unpacker_utils::path::resolve_path;
use utils::{set_color, set_progress};

mod cli;
mod logging;
mod progress;
mod utils;

fn create_unpacker() -> (Unpacker, ProgressGuard) {
    let (sink, receiver) = ChannelSink::new();
    let events: EventSinkHandle = Arc::new(sink);
    let guard = spawn_event_handler(receiver);

    let unpacker = Unpacker::new(get_config(), events);
    let on_interrupt = unpacker.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && on_interrupt.cancel() {
            warn!("Interrupted, stopping after the current step");
        }
    });

    (unpacker, guard)
}

async fn inspect(unpacker: &Unpacker, archive: &Path) -> UnpackerResult<()> {
    let analysis = unpacker.analyze(archive).await?;
    let executable = &analysis.executable;

    info!("Name:       {}", analysis.identity.name());
    info!("Version:    {}", analysis.identity.version());
    info!("Executable: {}", analysis.relative_executable().display());
    info!(
        "Type:       {}",
        if executable.is_elf() { "ELF binary" } else { "script" }
    );
    info!("Size:       {} bytes", executable.size);
    Ok(())
}

async fn install(unpacker: &Unpacker, archive: &Path, options: InstallOptions) -> UnpackerResult<()> {
    let app = unpacker.run(archive, options).await.into_result()?;

    match app.location {
        InstalledTo::System(report) => {
            info!(
                "{} {} is installed as a {} package",
                app.identity.name(),
                app.identity.version(),
                report.package_manager
            );
        }
        InstalledTo::User(plan) => {
            info!("Files:    {}", plan.app_dir.display());
            info!("Launcher: {}", plan.bin_link.display());
            info!("Menu:     {}", plan.desktop_file.display());
        }
    }
    Ok(())
}

async fn handle_cli() -> UnpackerResult<()> {
    let args = Args::parse();

    set_color(!args.no_color);
    set_progress(!args.no_progress && !args.json);
    setup_logging(&args);

    if let Some(ref path) = args.config {
        set_config_path(resolve_path(path)?);
    }
    debug!(config = %config_path().display(), "using config file");

    match args.command {
        Commands::DefConfig => {
            let path = generate_default_config()?;
            info!("Wrote {}", path.display());
        }
        Commands::Config => {
            config::init()?;
            let doc = get_config().to_annotated_document()?;
            info!("# {}\n{doc}", config_path().display());
        }
        command => {
            config::init()?;
            let (unpacker, progress_guard) = create_unpacker();

            let result = match command {
                Commands::Install {
                    archive,
                    user,
                    system,
                    icon,
                    name,
                    app_version,
                } => {
                    let options = InstallOptions {
                        system_wide: Commands::system_wide(user, system),
                        icon,
                        name,
                        version: app_version,
                    };
                    install(&unpacker, &archive, options).await
                }
                Commands::Inspect {
                    archive,
                } => inspect(&unpacker, &archive).await,
                Commands::DefConfig | Commands::Config => Ok(()),
            };

            // Dropping the unpacker closes the event channel so the handler
            // thread can drain and exit.
            drop(unpacker);
            progress_guard.finish();
            progress::stop();
            result?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
