//! Parte diario: código de asistencia, abonos y horarios de cada componente.
//!
//! Se guarda en local al momento y en el backend remoto con retardo
//! (upsert en `partes` + sustitución completa de `parte_filas`).

use crate::almacen::{no_vacio, texto, AlmacenFilas, Consulta, Fila, Filtro, Orden};
use crate::debounce::Debouncer;
use crate::error::{CuadernilloError, Resultado};
use crate::registro::componentes::Componente;
use crate::seleccion::TipoCentro;
use crate::sesion::{ContextoSesion, SeleccionActual};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodigoParte {
    JR,
    TH,
    TC,
    V,
    B,
}

impl CodigoParte {
    pub const TODOS: [CodigoParte; 5] =
        [CodigoParte::JR, CodigoParte::TH, CodigoParte::TC, CodigoParte::V, CodigoParte::B];

    pub fn como_str(&self) -> &'static str {
        match self {
            CodigoParte::JR => "JR",
            CodigoParte::TH => "TH",
            CodigoParte::TC => "TC",
            CodigoParte::V => "V",
            CodigoParte::B => "B",
        }
    }
}

impl fmt::Display for CodigoParte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.como_str())
    }
}

impl FromStr for CodigoParte {
    type Err = CuadernilloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodigoParte::TODOS
            .into_iter()
            .find(|c| c.como_str() == s.trim())
            .ok_or_else(|| CuadernilloError::validacion(format!("código desconocido: '{}'", s)))
    }
}

/// Intervalo `HH:MM`-`HH:MM`; cadenas vacías si no se ha rellenado.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tramo {
    #[serde(default)]
    pub ini: String,
    #[serde(default)]
    pub fin: String,
}

impl Tramo {
    pub fn vacio(&self) -> bool {
        self.ini.is_empty() && self.fin.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParteFila {
    pub componente_id: String,
    #[serde(default)]
    pub codigo: Option<CodigoParte>,
    #[serde(default)]
    pub abono_df: bool,
    #[serde(default)]
    pub superior_categoria: bool,
    #[serde(default)]
    pub jornada: Tramo,
    #[serde(default)]
    pub salida: Tramo,
}

impl ParteFila {
    pub fn vacia(componente_id: &str) -> Self {
        ParteFila {
            componente_id: componente_id.to_string(),
            codigo: None,
            abono_df: false,
            superior_categoria: false,
            jornada: Tramo::default(),
            salida: Tramo::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParteDiario {
    #[serde(default)]
    pub filas: Vec<ParteFila>,
    /// Texto libre: `"2"`, `"2,5"` o `"02:30"`.
    #[serde(default)]
    pub horas_extras_total: String,
}

impl ParteDiario {
    pub fn validar(&self) -> Resultado<()> {
        for f in &self.filas {
            for h in [&f.jornada.ini, &f.jornada.fin, &f.salida.ini, &f.salida.fin] {
                validar_hora(h)?;
            }
        }
        Ok(())
    }

    pub fn horas_extras(&self) -> Option<f64> {
        parsear_horas_extras(&self.horas_extras_total)
    }
}

/// Acepta `""` o `HH:MM`.
pub fn validar_hora(h: &str) -> Resultado<()> {
    if h.is_empty() || NaiveTime::parse_from_str(h, "%H:%M").is_ok() {
        Ok(())
    } else {
        Err(CuadernilloError::validacion(format!("hora inválida: '{}' (se espera HH:MM)", h)))
    }
}

pub fn parsear_horas_extras(texto: &str) -> Option<f64> {
    let t = texto.trim();
    if t.is_empty() {
        return None;
    }
    if let Some((h, m)) = t.split_once(':') {
        let h: u32 = h.trim().parse().ok()?;
        let m: u32 = m.trim().parse().ok()?;
        if m >= 60 {
            return None;
        }
        return Some(h as f64 + m as f64 / 60.0);
    }
    t.replace(',', ".").parse::<f64>().ok().filter(|x| x.is_finite() && *x >= 0.0)
}

/// Clave del parte: `YYYY-MM-DD:<tipo>:<centro>`.
pub fn clave_parte(sel: Option<&SeleccionActual>, fecha: NaiveDate) -> String {
    let tipo = sel.map(|s| s.tipo.como_str()).unwrap_or("NA");
    let centro = sel.map(|s| s.seleccion.as_str()).filter(|c| !c.is_empty()).unwrap_or("SIN");
    format!("{}:{}:{}", fecha.format("%Y-%m-%d"), tipo, centro)
}

/// Una fila por componente, en el orden de la plantilla. Conserva las filas
/// existentes y crea vacías para los nuevos.
pub fn sincronizar_con_componentes(filas: Vec<ParteFila>, componentes: &[Componente]) -> Vec<ParteFila> {
    let mut por_id: HashMap<String, ParteFila> =
        filas.into_iter().map(|f| (f.componente_id.clone(), f)).collect();
    componentes
        .iter()
        .map(|c| por_id.remove(&c.id).unwrap_or_else(|| ParteFila::vacia(&c.id)))
        .collect()
}

fn fila_remota(pk: &str, f: &ParteFila) -> Fila {
    let v = json!({
        "parte_pk": pk,
        "componente_id": f.componente_id,
        "codigo": f.codigo.map(|c| c.como_str()),
        "abono_df": f.abono_df,
        "superior_categoria": f.superior_categoria,
        "jornada_ini": no_vacio(&f.jornada.ini),
        "jornada_fin": no_vacio(&f.jornada.fin),
        "salida_ini": no_vacio(&f.salida.ini),
        "salida_fin": no_vacio(&f.salida.fin),
    });
    match v {
        Value::Object(m) => m,
        _ => Fila::new(),
    }
}

fn desde_fila_remota(f: &Fila) -> ParteFila {
    let flag = |c: &str| match f.get(c) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    };
    ParteFila {
        componente_id: texto(f, "componente_id"),
        codigo: texto(f, "codigo").parse().ok(),
        abono_df: flag("abono_df"),
        superior_categoria: flag("superior_categoria"),
        jornada: Tramo { ini: texto(f, "jornada_ini"), fin: texto(f, "jornada_fin") },
        salida: Tramo { ini: texto(f, "salida_ini"), fin: texto(f, "salida_fin") },
    }
}

/// Upsert de la cabecera y sustitución (borrar + insertar) de las filas.
/// No es atómico: si falla el insert quedan borradas las filas anteriores.
pub fn guardar_remoto(
    almacen: &dyn AlmacenFilas,
    pk: &str,
    sel: &SeleccionActual,
    fecha: NaiveDate,
    parte: &ParteDiario,
) -> Resultado<()> {
    let cabecera = json!({
        "pk": pk,
        "fecha": fecha.format("%Y-%m-%d").to_string(),
        "zona": sel.zona,
        "municipio": sel.municipio,
        "tipo": sel.tipo.como_str(),
        "unidad": if sel.tipo == TipoCentro::Unidad { Some(&sel.seleccion) } else { None },
        "caseta": if sel.tipo == TipoCentro::Caseta { Some(&sel.seleccion) } else { None },
        "nombre_centro": sel.nombre_centro,
        "horas_extras_total": parte.horas_extras(),
    });
    if let Value::Object(fila) = cabecera {
        almacen.upsert("partes", &fila, "pk")?;
    }

    almacen.delete("parte_filas", &Filtro::new().igual("parte_pk", pk))?;
    if !parte.filas.is_empty() {
        let filas: Vec<Fila> = parte.filas.iter().map(|f| fila_remota(pk, f)).collect();
        almacen.insert("parte_filas", &filas)?;
    }
    Ok(())
}

/// Parte guardado en el backend remoto, si existe.
pub fn cargar_remoto(almacen: &dyn AlmacenFilas, pk: &str) -> Resultado<Option<ParteDiario>> {
    let cabecera = almacen.select("partes", &Consulta::new(Filtro::new().igual("pk", pk)))?;
    let Some(fila) = cabecera.filas.first() else {
        return Ok(None);
    };
    let horas_extras_total = match fila.get("horas_extras_total") {
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let lineas = almacen.select(
        "parte_filas",
        &Consulta::new(Filtro::new().igual("parte_pk", pk)).ordenar(Orden::asc("id")),
    )?;
    Ok(Some(ParteDiario {
        filas: lineas.filas.iter().map(desde_fila_remota).collect(),
        horas_extras_total,
    }))
}

/// Copia local y, si hay backend, la remota (que tiene prioridad). Un fallo
/// remoto al leer no impide usar la copia local.
pub fn cargar(ctx: &ContextoSesion, almacen: Option<&dyn AlmacenFilas>, pk: &str) -> Resultado<ParteDiario> {
    let mut parte = ctx.parte_local(pk)?.unwrap_or_default();
    if let Some(almacen) = almacen {
        match cargar_remoto(almacen, pk) {
            Ok(Some(remoto)) => {
                if !remoto.horas_extras_total.is_empty() {
                    parte.horas_extras_total = remoto.horas_extras_total;
                }
                parte.filas = remoto.filas;
            }
            Ok(None) => {}
            Err(e) => warn!(pk, error = %e, "no se pudo leer el parte remoto"),
        }
    }
    Ok(parte)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guardado {
    /// Guardado en local y escritura remota programada.
    Programado,
    /// Sin backend o sin selección confirmada: sólo local.
    SoloLocal,
}

/// Guarda en local inmediatamente y programa la escritura remota.
pub fn guardar(
    ctx: &ContextoSesion,
    almacen: Option<&Arc<dyn AlmacenFilas>>,
    debouncer: &Debouncer,
    sel: Option<&SeleccionActual>,
    fecha: NaiveDate,
    parte: &ParteDiario,
) -> Resultado<Guardado> {
    parte.validar()?;
    let pk = clave_parte(sel, fecha);
    ctx.guardar_parte_local(&pk, parte)?;

    let (Some(almacen), Some(sel)) = (almacen, sel) else {
        return Ok(Guardado::SoloLocal);
    };
    let almacen = Arc::clone(almacen);
    let sel = sel.clone();
    let parte = parte.clone();
    let clave = format!("parte:{}", pk);
    debouncer.programar(clave, move || async move {
        let pk_log = pk.clone();
        let r = tokio::task::spawn_blocking(move || guardar_remoto(almacen.as_ref(), &pk, &sel, fecha, &parte)).await;
        match r {
            Ok(Ok(())) => info!(pk = %pk_log, "parte sincronizado"),
            Ok(Err(e)) => error!(pk = %pk_log, error = %e, "fallo al sincronizar el parte"),
            Err(e) => error!(pk = %pk_log, error = %e, "tarea de sincronización abortada"),
        }
    });
    Ok(Guardado::Programado)
}

/// Salida desde el centro de trabajo de un componente.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalidaTrabajo {
    pub componente_id: String,
    pub componente: String,
    pub ini: String,
    pub fin: String,
}

pub fn salidas_trabajo(parte: &ParteDiario, componentes: &[Componente]) -> Vec<SalidaTrabajo> {
    parte
        .filas
        .iter()
        .filter(|f| !f.salida.vacio())
        .map(|f| SalidaTrabajo {
            componente_id: f.componente_id.clone(),
            componente: componentes
                .iter()
                .find(|c| c.id == f.componente_id)
                .map(Componente::etiqueta)
                .unwrap_or_default(),
            ini: f.salida.ini.clone(),
            fin: f.salida.fin.clone(),
        })
        .collect()
}
