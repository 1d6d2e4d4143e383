use crate::api_json::{parametro, respuesta_error};
use crate::seleccion::{calcular_candidatos, TipoCentro};
use crate::server::EstadoApp;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::collections::HashMap;

/// GET /catalogo/provincias
pub async fn provincias_handler(estado: web::Data<EstadoApp>) -> impl Responder {
    HttpResponse::Ok().json(json!({"provincias": estado.catalogo.provincias()}))
}

/// GET /catalogo/zonas?provincia=Cáceres
pub async fn zonas_handler(estado: web::Data<EstadoApp>, query: web::Query<HashMap<String, String>>) -> impl Responder {
    let provincia = parametro(&query, "provincia").unwrap_or_default();
    HttpResponse::Ok().json(json!({"zonas": estado.catalogo.zonas(&provincia)}))
}

/// GET /catalogo/municipios?provincia=...&zona=...
pub async fn municipios_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let provincia = parametro(&query, "provincia").unwrap_or_default();
    let zona = parametro(&query, "zona").unwrap_or_default();
    HttpResponse::Ok().json(json!({"municipios": estado.catalogo.municipios(&provincia, &zona)}))
}

/// GET /catalogo/candidatos?provincia=...&zona=...&municipio=...&tipo=unidad|caseta
///
/// Claves desconocidas devuelven una lista vacía, no un error.
pub async fn candidatos_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let tipo = match parametro(&query, "tipo").map(|t| t.parse::<TipoCentro>()).transpose() {
        Ok(t) => t,
        Err(e) => return respuesta_error(&e),
    };
    let provincia = parametro(&query, "provincia").unwrap_or_default();
    let zona = parametro(&query, "zona").unwrap_or_default();
    // el municipio se usa tal cual: las casetas se buscan por nombre exacto
    let municipio = query.get("municipio").cloned().unwrap_or_default();
    let candidatos = match estado.catalogo.zona(&provincia, &zona) {
        Some(z) => calcular_candidatos(tipo, &municipio, z),
        None => Vec::new(),
    };
    HttpResponse::Ok().json(json!({"candidatos": candidatos}))
}
