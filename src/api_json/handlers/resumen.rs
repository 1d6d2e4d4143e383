use crate::api_json::{parametro, parametro_numerico, respuesta_error, CambioCelda};
use crate::error::{CuadernilloError, Resultado};
use crate::registro::cuadrante::{self, CodigoCuadrante, CuadranteMensual};
use crate::registro::resumen::{self, ResumenAnual, ResumenMensual};
use crate::server::EstadoApp;
use crate::sesion::SeleccionActual;
use actix_web::{web, HttpResponse, Responder};
use chrono::{Datelike, Local};
use serde_json::{json, Value};
use std::collections::HashMap;

fn seleccion_confirmada(estado: &EstadoApp) -> Resultado<SeleccionActual> {
    estado
        .sesion
        .seleccion_actual()?
        .ok_or_else(|| CuadernilloError::validacion("no hay selección confirmada"))
}

/// `anio` y `mes` de la consulta; por defecto los actuales.
fn anio_mes(qm: &HashMap<String, String>) -> Resultado<(i32, u32)> {
    let hoy = Local::now().date_naive();
    Ok((
        parametro_numerico(qm, "anio")?.unwrap_or(hoy.year()),
        parametro_numerico(qm, "mes")?.unwrap_or(hoy.month()),
    ))
}

fn mensual(estado: &EstadoApp, qm: &HashMap<String, String>) -> Resultado<ResumenMensual> {
    let (anio, mes) = anio_mes(qm)?;
    let sel = seleccion_confirmada(estado)?;
    let componentes = estado.sesion.componentes()?;
    resumen::resumen_mensual(&estado.sesion, estado.almacen.as_deref(), &sel, &componentes, anio, mes)
}

fn anual(estado: &EstadoApp, qm: &HashMap<String, String>) -> Resultado<ResumenAnual> {
    let (anio, _) = anio_mes(qm)?;
    let sel = seleccion_confirmada(estado)?;
    let componentes = estado.sesion.componentes()?;
    resumen::resumen_anual(&estado.sesion, estado.almacen.as_deref(), &sel, &componentes, anio)
}

fn rejilla(estado: &EstadoApp, qm: &HashMap<String, String>) -> Resultado<Value> {
    let (anio, mes) = anio_mes(qm)?;
    let sel = seleccion_confirmada(estado)?;
    let componentes = estado.sesion.componentes()?;
    let c = cuadrante::cargar(&estado.sesion, anio, mes, &sel.seleccion)?;
    let q = parametro(qm, "q").unwrap_or_default();
    let codigos: Vec<Value> = CodigoCuadrante::TODOS
        .iter()
        .map(|k| json!({"codigo": k.como_str(), "etiqueta": k.etiqueta()}))
        .collect();
    Ok(json!({
        "anio": c.anio,
        "mes": c.mes,
        "dias": c.dias(),
        "centro": sel.seleccion,
        "filas": c.filas(&componentes, &q),
        "codigos": codigos,
    }))
}

fn fijar_celda(estado: &EstadoApp, cambio: &CambioCelda) -> Resultado<CuadranteMensual> {
    let sel = seleccion_confirmada(estado)?;
    let codigo = match cambio.codigo.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => Some(c.parse::<CodigoCuadrante>()?),
        None => None,
    };
    cuadrante::asignar_celda(
        &estado.sesion,
        &sel.seleccion,
        cambio.anio,
        cambio.mes,
        &cambio.componente_id,
        cambio.dia,
        codigo,
    )
}

/// GET /resumen-mensual?anio=2025&mes=8
pub async fn resumen_mensual_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    match mensual(&estado, &query) {
        Ok(r) => HttpResponse::Ok().json(r),
        Err(e) => respuesta_error(&e),
    }
}

/// GET /resumen-anual?anio=2025
pub async fn resumen_anual_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    match anual(&estado, &query) {
        Ok(r) => HttpResponse::Ok().json(r),
        Err(e) => respuesta_error(&e),
    }
}

/// GET /cuadrante?anio=2025&mes=8&q=garcia
pub async fn cuadrante_get_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    match rejilla(&estado, &query) {
        Ok(v) => HttpResponse::Ok().json(v),
        Err(e) => respuesta_error(&e),
    }
}

/// PUT /cuadrante/celda
pub async fn cuadrante_celda_handler(estado: web::Data<EstadoApp>, body: web::Json<CambioCelda>) -> impl Responder {
    match fijar_celda(&estado, &body) {
        Ok(c) => HttpResponse::Ok().json(json!({"status": "ok", "anio": c.anio, "mes": c.mes})),
        Err(e) => respuesta_error(&e),
    }
}
