use anyhow::Context;
use web::{
    configuration::get_configuration,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    // Redirect all `log`'s event to our subscriber
    let subscriber = get_subscriber("signed-auth-web".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let configuration = get_configuration().context("Failed to read configuration.")?;
    let app = Application::build(configuration)
        .await
        .context("Failed to build the application.")?;
    tracing::info!(port = app.port(), "Listening");
    let application_task = tokio::spawn(app.run_until_stopped());

    tokio::select! {
        outcome = application_task => report_exit("API", outcome),
    };

    Ok(())
}

fn report_exit(
    task_name: &str,
    outcome: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) {
    match outcome {
        Ok(Ok(())) => tracing::info!("{} has exited", task_name),
        Ok(Err(e)) => tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "{} failed",
            task_name
        ),
        Err(e) => tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "{} task failed to complete",
            task_name
        ),
    }
}
