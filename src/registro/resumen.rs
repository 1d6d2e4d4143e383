//! Resúmenes mensual y anual a partir de los partes diarios de un centro.

use crate::almacen::AlmacenFilas;
use crate::error::{CuadernilloError, Resultado};
use crate::registro::componentes::Componente;
use crate::registro::cuadrante::dias_del_mes;
use crate::registro::parte::{self, clave_parte, CodigoParte, ParteDiario};
use crate::sesion::{ContextoSesion, SeleccionActual};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilaResumen {
    pub componente_id: String,
    pub componente: String,
    /// Índice 0 = día 1.
    pub dias: Vec<Option<CodigoParte>>,
    pub totales: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumenMensual {
    pub anio: i32,
    pub mes: u32,
    pub dias: u32,
    pub filas: Vec<FilaResumen>,
    pub totales: BTreeMap<String, u32>,
    pub horas_extras: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumenMes {
    pub mes: u32,
    pub totales: BTreeMap<String, u32>,
    pub horas_extras: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalComponente {
    pub componente_id: String,
    pub componente: String,
    pub totales: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumenAnual {
    pub anio: i32,
    pub meses: Vec<ResumenMes>,
    pub por_componente: Vec<TotalComponente>,
    pub totales: BTreeMap<String, u32>,
}

fn sumar(destino: &mut BTreeMap<String, u32>, origen: &BTreeMap<String, u32>) {
    for (k, v) in origen {
        *destino.entry(k.clone()).or_insert(0) += v;
    }
}

fn partes_del_mes(
    ctx: &ContextoSesion,
    almacen: Option<&dyn AlmacenFilas>,
    sel: &SeleccionActual,
    anio: i32,
    mes: u32,
) -> Resultado<(u32, Vec<(u32, ParteDiario)>)> {
    let dias = dias_del_mes(anio, mes)
        .ok_or_else(|| CuadernilloError::validacion(format!("mes inválido: {}-{}", anio, mes)))?;
    let mut partes = Vec::new();
    for dia in 1..=dias {
        let Some(fecha) = NaiveDate::from_ymd_opt(anio, mes, dia) else {
            continue;
        };
        let p = parte::cargar(ctx, almacen, &clave_parte(Some(sel), fecha))?;
        if !p.filas.is_empty() || !p.horas_extras_total.is_empty() {
            partes.push((dia, p));
        }
    }
    Ok((dias, partes))
}

/// Código de cada componente por día y recuento por código.
pub fn resumen_mensual(
    ctx: &ContextoSesion,
    almacen: Option<&dyn AlmacenFilas>,
    sel: &SeleccionActual,
    componentes: &[Componente],
    anio: i32,
    mes: u32,
) -> Resultado<ResumenMensual> {
    let (dias, partes) = partes_del_mes(ctx, almacen, sel, anio, mes)?;
    let mut filas: Vec<FilaResumen> = componentes
        .iter()
        .map(|c| FilaResumen {
            componente_id: c.id.clone(),
            componente: c.etiqueta(),
            dias: vec![None; dias as usize],
            totales: BTreeMap::new(),
        })
        .collect();
    let mut horas_extras = 0.0;
    for (dia, p) in &partes {
        horas_extras += p.horas_extras().unwrap_or(0.0);
        for f in &p.filas {
            let (Some(codigo), Some(fila)) = (f.codigo, filas.iter_mut().find(|r| r.componente_id == f.componente_id))
            else {
                continue;
            };
            fila.dias[(*dia - 1) as usize] = Some(codigo);
            *fila.totales.entry(codigo.como_str().to_string()).or_insert(0) += 1;
        }
    }
    let mut totales = BTreeMap::new();
    for f in &filas {
        sumar(&mut totales, &f.totales);
    }
    debug!(anio, mes, partes = partes.len(), "resumen mensual");
    Ok(ResumenMensual { anio, mes, dias, filas, totales, horas_extras })
}

/// Agregados por mes y por componente.
pub fn resumen_anual(
    ctx: &ContextoSesion,
    almacen: Option<&dyn AlmacenFilas>,
    sel: &SeleccionActual,
    componentes: &[Componente],
    anio: i32,
) -> Resultado<ResumenAnual> {
    let mut meses = Vec::with_capacity(12);
    let mut por_componente: Vec<TotalComponente> = componentes
        .iter()
        .map(|c| TotalComponente { componente_id: c.id.clone(), componente: c.etiqueta(), totales: BTreeMap::new() })
        .collect();
    let mut totales = BTreeMap::new();
    for mes in 1..=12 {
        let r = resumen_mensual(ctx, almacen, sel, componentes, anio, mes)?;
        for (acum, fila) in por_componente.iter_mut().zip(&r.filas) {
            sumar(&mut acum.totales, &fila.totales);
        }
        sumar(&mut totales, &r.totales);
        meses.push(ResumenMes { mes, totales: r.totales, horas_extras: r.horas_extras });
    }
    Ok(ResumenAnual { anio, meses, por_componente, totales })
}
