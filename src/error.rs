//! Errores del crate.
//!
//! Todas las operaciones que tocan almacenamiento, catálogo o configuración
//! devuelven `Resultado<T>`. Los handlers HTTP traducen cada variante a un
//! código de estado (ver `api_json::respuesta_error`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CuadernilloError {
    /// No hay backend remoto configurado (modo degradado).
    #[error("backend remoto no configurado (CUADERNILLO_DB_URL)")]
    SinBackend,

    #[error("error del almacén: {0}")]
    Almacen(#[from] rusqlite::Error),

    #[error("error del backend Postgres: {0}")]
    Postgres(#[from] postgres::Error),

    /// Valor que no encaja en la columna o hilo del backend caído.
    #[error("backend remoto: {0}")]
    Remoto(String),

    #[error("JSON inválido: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("catálogo inválido: {0}")]
    CatalogoInvalido(String),

    #[error("{0}")]
    Validacion(String),

    #[error("configuración inválida: {0}")]
    Configuracion(String),

    #[error("credenciales incorrectas")]
    NoAutorizado,
}

pub type Resultado<T> = Result<T, CuadernilloError>;

impl CuadernilloError {
    pub fn validacion(msg: impl Into<String>) -> Self {
        CuadernilloError::Validacion(msg.into())
    }
}
