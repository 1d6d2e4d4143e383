use crate::api_json::{parametro, parametro_numerico, parsear_fecha, respuesta_error, token_bearer, Credenciales};
use crate::error::{CuadernilloError, Resultado};
use crate::registro::cuadernillo::{self, BusquedaAdmin, ModoBusqueda, PaginaAdmin};
use crate::server::EstadoApp;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use std::collections::HashMap;

/// POST /admin/login
pub async fn admin_login_handler(estado: web::Data<EstadoApp>, body: web::Json<Credenciales>) -> impl Responder {
    match estado.admin.login(&body.usuario, &body.clave) {
        Ok(token) => HttpResponse::Ok().json(json!({"token": token})),
        Err(e) => respuesta_error(&e),
    }
}

/// POST /admin/logout
pub async fn admin_logout_handler(estado: web::Data<EstadoApp>, req: HttpRequest) -> impl Responder {
    match token_bearer(&req) {
        Some(t) if estado.admin.logout(&t) => HttpResponse::Ok().json(json!({"status": "ok"})),
        _ => respuesta_error(&CuadernilloError::NoAutorizado),
    }
}

fn autorizar(estado: &EstadoApp, req: &HttpRequest) -> Resultado<()> {
    match token_bearer(req) {
        Some(t) if estado.admin.es_valido(&t) => Ok(()),
        _ => Err(CuadernilloError::NoAutorizado),
    }
}

/// `fecha` obligatoria; `modo` = centro|componente, `q`, `page` (desde 0) y
/// `page_size` (50, 100 o 200).
fn busqueda_desde_query(qm: &HashMap<String, String>) -> Resultado<BusquedaAdmin> {
    let fecha = parametro(qm, "fecha").ok_or_else(|| CuadernilloError::validacion("falta el parámetro 'fecha'"))?;
    let modo = match parametro(qm, "modo").as_deref() {
        None | Some("centro") => ModoBusqueda::Centro,
        Some("componente") => ModoBusqueda::Componente,
        Some(otro) => return Err(CuadernilloError::validacion(format!("modo de búsqueda desconocido: '{}'", otro))),
    };
    Ok(BusquedaAdmin {
        fecha: parsear_fecha(&fecha)?,
        modo,
        q: parametro(qm, "q").unwrap_or_default(),
        pagina: parametro_numerico(qm, "page")?.unwrap_or(0),
        tamano_pagina: parametro_numerico(qm, "page_size")?.unwrap_or(cuadernillo::TAMANOS_PAGINA[0]),
    })
}

fn buscar(estado: &EstadoApp, req: &HttpRequest, qm: &HashMap<String, String>) -> Resultado<(BusquedaAdmin, PaginaAdmin)> {
    autorizar(estado, req)?;
    let almacen = estado.almacen.as_deref().ok_or(CuadernilloError::SinBackend)?;
    let b = busqueda_desde_query(qm)?;
    let pagina = cuadernillo::buscar(almacen, &b)?;
    Ok((b, pagina))
}

/// GET /admin/cuadernillo?fecha=2025-08-01&modo=centro&q=plasencia&page=0&page_size=50
pub async fn admin_search_handler(
    estado: web::Data<EstadoApp>,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    match buscar(&estado, &req, &query) {
        Ok((_, pagina)) => HttpResponse::Ok().json(pagina),
        Err(e) => respuesta_error(&e),
    }
}

/// GET /admin/cuadernillo.csv con los mismos parámetros: la página pedida en CSV.
pub async fn admin_csv_handler(
    estado: web::Data<EstadoApp>,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    match buscar(&estado, &req, &query) {
        Ok((b, pagina)) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .append_header((
                actix_web::http::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", cuadernillo::nombre_archivo_csv(b.fecha, b.pagina)),
            ))
            .body(cuadernillo::exportar_csv(&pagina.filas)),
        Err(e) => respuesta_error(&e),
    }
}
