// --- Cuadernillo de bomberos forestales - servidor HTTP ---

use cuadernillo::{run_server, Config, EstadoApp};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::desde_entorno().map_err(|e| std::io::Error::other(e.to_string()))?;
    let estado = EstadoApp::desde_config(config).map_err(|e| std::io::Error::other(e.to_string()))?;
    run_server(estado).await
}
