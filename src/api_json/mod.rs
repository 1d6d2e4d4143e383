//! Cuerpos JSON de la API y utilidades comunes de los handlers.

pub mod handlers;

use crate::error::CuadernilloError;
use crate::seleccion::Nivel;
use actix_web::{HttpRequest, HttpResponse};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::error;

pub const AVISO_SIN_BACKEND: &str =
    "backend remoto no configurado: los cambios se han guardado sólo en este dispositivo";

/// POST /seleccion
///
/// ```json
/// { "nivel": "municipio", "valor": "Plasencia" }
/// ```
/// Un `valor` vacío reinicia ese nivel y los siguientes.
#[derive(Debug, Serialize, Deserialize)]
pub struct CambioSeleccion {
    pub nivel: Nivel,
    #[serde(default)]
    pub valor: String,
}

/// POST /seleccion/confirmar. Sin `fecha` se usa la de hoy.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Confirmacion {
    #[serde(default)]
    pub fecha: Option<String>,
}

/// POST /componentes
#[derive(Debug, Serialize, Deserialize)]
pub struct NuevoComponente {
    pub nombre: String,
    pub apellidos: String,
    #[serde(default)]
    pub numero: Option<String>,
}

/// PUT /cuadrante/celda
#[derive(Debug, Serialize, Deserialize)]
pub struct CambioCelda {
    pub anio: i32,
    pub mes: u32,
    pub componente_id: String,
    pub dia: u32,
    /// `null` o `""` borra la celda.
    #[serde(default)]
    pub codigo: Option<String>,
}

/// POST /admin/login
#[derive(Debug, Serialize, Deserialize)]
pub struct Credenciales {
    pub usuario: String,
    pub clave: String,
}

/// Traduce un error del dominio a su respuesta HTTP.
pub fn respuesta_error(e: &CuadernilloError) -> HttpResponse {
    let cuerpo = json!({"error": e.to_string()});
    match e {
        CuadernilloError::Validacion(_) | CuadernilloError::CatalogoInvalido(_) | CuadernilloError::Json(_) => {
            HttpResponse::BadRequest().json(cuerpo)
        }
        CuadernilloError::NoAutorizado => HttpResponse::Unauthorized().json(cuerpo),
        CuadernilloError::SinBackend => HttpResponse::ServiceUnavailable().json(cuerpo),
        CuadernilloError::Almacen(_) | CuadernilloError::Postgres(_) | CuadernilloError::Remoto(_) => {
            error!(error = %e, "fallo del backend remoto");
            HttpResponse::BadGateway().json(cuerpo)
        }
        CuadernilloError::Io(_) | CuadernilloError::Configuracion(_) => {
            error!(error = %e, "error interno");
            HttpResponse::InternalServerError().json(cuerpo)
        }
    }
}

/// Parámetro de consulta recortado; `None` si falta o está vacío.
pub fn parametro(qm: &HashMap<String, String>, clave: &str) -> Option<String> {
    qm.get(clave).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn parsear_fecha(texto: &str) -> Result<NaiveDate, CuadernilloError> {
    NaiveDate::parse_from_str(texto.trim(), "%Y-%m-%d")
        .map_err(|_| CuadernilloError::validacion(format!("fecha inválida: '{}' (se espera YYYY-MM-DD)", texto)))
}

/// `fecha` de la consulta o, si falta, la de hoy.
pub fn fecha_o_hoy(qm: &HashMap<String, String>) -> Result<NaiveDate, CuadernilloError> {
    match parametro(qm, "fecha") {
        Some(f) => parsear_fecha(&f),
        None => Ok(Local::now().date_naive()),
    }
}

pub fn parametro_numerico<T: std::str::FromStr>(
    qm: &HashMap<String, String>,
    clave: &str,
) -> Result<Option<T>, CuadernilloError> {
    match parametro(qm, clave) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| CuadernilloError::validacion(format!("parámetro '{}' inválido: '{}'", clave, v))),
        None => Ok(None),
    }
}

/// Token de `Authorization: Bearer <token>`.
pub fn token_bearer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
