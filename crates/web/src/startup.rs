use actix_cors::Cors;
use actix_web::middleware::from_fn;
use actix_web::{dev::Server, web, web::Data, App, HttpServer};
use signed_auth::{Clock, SystemClock};
use std::{io::Error, net::TcpListener, sync::Arc};
use tracing_actix_web::TracingLogger;

use crate::{
    configuration::{AuthConfig, Settings},
    login::{EchoPasswordAuthenticator, LoginAuthenticator},
    middleware::require_credential,
    routes::{clear_key_caches, health_check, login_with_form, login_with_query, whoami},
};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        Self::build_with(
            configuration,
            Arc::new(EchoPasswordAuthenticator),
            Arc::new(SystemClock),
        )
        .await
    }

    pub async fn build_with(
        configuration: Settings,
        authenticator: Arc<dyn LoginAuthenticator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, anyhow::Error> {
        let auth = configuration.authentication.build(clock)?;

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(&address)
            .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", address, e))?;
        let port = listener.local_addr()?.port();

        let server = run(listener, auth, authenticator).await?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), Error> {
        self.server.await
    }
}

async fn run(
    listener: TcpListener,
    auth: AuthConfig,
    authenticator: Arc<dyn LoginAuthenticator>,
) -> Result<Server, anyhow::Error> {
    let auth = Data::new(auth);
    let authenticator: Data<dyn LoginAuthenticator> = Data::from(authenticator);
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .max_age(3600);
        App::new()
            // Logger middleware
            // Sent active-web log to log subscriber
            .wrap(TracingLogger::default())
            .wrap(cors)
            .service(health_check)
            .service(login_with_query)
            .service(login_with_form)
            .service(
                web::scope("/api")
                    .wrap(from_fn(require_credential))
                    .service(whoami)
                    .service(clear_key_caches),
            )
            .app_data(auth.clone())
            .app_data(authenticator.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}
