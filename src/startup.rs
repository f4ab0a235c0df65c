use actix_multipart::form::tempfile::TempFileConfig;
use actix_web::{
    dev::Server,
    web::{self, Data},
    App, HttpServer,
};
use std::net::TcpListener;
use std::path::PathBuf;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::{
    configuration::Settings,
    repositories::{
        parse_job_http_repository::ParseJobHttpRepository,
        parsed_record_fs_repository::ParsedRecordFsRepository,
    },
    routes::{health_check, parse_document},
};

/// Holds the newly built server, and some useful properties
pub struct Application {
    server: Server,
    port: u16,
}

#[derive(thiserror::Error, Debug)]
pub enum ApplicationBuildError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl Application {
    /// # Parameters
    /// - nb_workers: number of actix-web workers
    ///   if `None`, the number of available physical CPUs is used as the worker count.
    #[tracing::instrument(name = "Building application", skip(settings))]
    pub async fn build(
        settings: Settings,
        nb_workers: Option<usize>,
    ) -> Result<Self, ApplicationBuildError> {
        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        // Uploads are buffered in a dedicated directory while a request is
        // being handled; it must exist before the first request comes in
        let upload_dir = PathBuf::from(&settings.storage.upload_dir);
        tokio::fs::create_dir_all(&upload_dir).await?;

        let parse_job_repository = ParseJobHttpRepository::new(&settings.parser);
        let parsed_record_repository = ParsedRecordFsRepository::new(&settings.storage);

        let server = run(
            listener,
            nb_workers,
            upload_dir,
            parse_job_repository,
            parsed_record_repository,
        )?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// This function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        info!("Running server ...");
        self.server.await
    }
}

/// listener: the caller binds their own port
///
/// TracingLogger middleware: helps collecting telemetry data.
/// It generates a unique identifier for each incoming request: `request_id`.
///
/// # Parameters
/// - nb_workers: number of actix-web workers
///   if `None`, the number of available physical CPUs is used as the worker count.
pub fn run(
    listener: TcpListener,
    nb_workers: Option<usize>,
    upload_dir: PathBuf,
    parse_job_repository: ParseJobHttpRepository,
    parsed_record_repository: ParsedRecordFsRepository,
) -> Result<Server, std::io::Error> {
    // Wraps repositories in a `actix_web::Data` (`Arc`) to be able to register them
    // and access them from handlers.
    // Those repositories are shared among all workers.
    let parse_job_repository = Data::new(parse_job_repository);
    let parsed_record_repository = Data::new(parsed_record_repository);

    // Buffers multipart uploads in the configured directory instead of the OS default
    let temp_file_config = TempFileConfig::default().directory(upload_dir);

    // `move` to capture variables from the surrounding environment
    let server = HttpServer::new(move || {
        info!("Starting actix-web worker");

        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/api/parse", web::post().to(parse_document))
            .app_data(parse_job_repository.clone())
            .app_data(parsed_record_repository.clone())
            .app_data(temp_file_config.clone())
    })
    .listen(listener)?;

    // If no workers were set, use the actix-web settings (number of workers = number of physical CPUs)
    if let Some(nb_workers) = nb_workers {
        return Ok(server.workers(nb_workers).run());
    }

    // No await
    Ok(server.run())
}
