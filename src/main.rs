use std::{collections::BTreeMap, io::Write, process, sync::Arc, time::Duration};

use catalog_fragments::{
    application::error::AppError,
    cache::Section,
    config::{self, RenderArgs, Settings},
    infra::{error::InfraError, http, runtime::FragmentRuntime, telemetry},
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let runtime = FragmentRuntime::from_settings(&settings).await?;
    let router = http::build_router(runtime.http_state());

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "serving catalog fragments");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => return finish_server(joined),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    info!(
        grace_secs = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested, draining connections"
    );
    shutdown.notify_one();
    drain(server, settings.server.graceful_shutdown).await
}

async fn drain(
    server: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => finish_server(joined),
        Err(_) => {
            warn!("graceful shutdown timed out, closing remaining connections");
            Ok(())
        }
    }
}

fn finish_server(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn run_render(settings: Settings, args: RenderArgs) -> Result<(), AppError> {
    let runtime = FragmentRuntime::from_settings(&settings).await?;
    let params: BTreeMap<String, String> = args.params.into_iter().collect();
    let mut scope = runtime.scope(args.uid, params);

    runtime.widget.process(&mut scope).await;
    let outcome = match args.section {
        Section::Body => runtime.widget.body(&mut scope).await,
        Section::Header => runtime.widget.header(&mut scope).await,
    };
    info!(section = %args.section, outcome = outcome.label(), "fragment rendered");

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(outcome.content().as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| AppError::from(InfraError::from(err)))
}
