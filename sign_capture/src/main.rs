use sign_capture::{config, start_app, telemetry};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::get_configuration()?;
    telemetry::init_tracing(&config.log_level);

    start_app(config)?;

    Ok(())
}
