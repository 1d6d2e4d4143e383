//! Contexto de sesión: único dueño de las claves del almacén local.
//!
//! Las pantallas (handlers) nunca leen ni escriben claves directamente; piden
//! al contexto la selección confirmada, la plantilla de componentes o las
//! copias locales de los partes. Un JSON corrupto bajo cualquier clave se
//! trata como ausencia.

pub mod kv;

pub use kv::{AlmacenClaveValor, KvMemoria, KvSqlite};

use crate::error::Resultado;
use crate::registro::componentes::Componente;
use crate::registro::cuadrante::CuadranteMensual;
use crate::registro::incendios::Salida;
use crate::registro::parte::ParteDiario;
use crate::seleccion::TipoCentro;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CLAVE_SELECCION: &str = "cuadernillo.currentSelection";
pub const CLAVE_COMPONENTES: &str = "cuadernillo.componentes";
/// Grafías antiguas de la plantilla, en orden de preferencia.
pub const CLAVES_COMPONENTES_LEGADAS: [&str; 2] = ["cuadernilo:componentes", "infoex:componentes"];

fn clave_parte(pk: &str) -> String {
    format!("cuadernillo.parte:{}", pk)
}

fn clave_incendios(pk: Option<&str>) -> String {
    format!("cuadernillo.incendios:{}", pk.unwrap_or("temp"))
}

fn clave_cuadrante(anio: i32, mes: u32, centro: &str) -> String {
    format!("cuadernillo.cuadrante:{:04}-{:02}:{}", anio, mes, centro)
}

/// Selección confirmada que consumen las pantallas posteriores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeleccionActual {
    pub session_key: String,
    pub provincia: Option<String>,
    pub zona: Option<String>,
    pub municipio: Option<String>,
    pub tipo: TipoCentro,
    /// Unidad o caseta elegida en el último selector.
    pub seleccion: String,
    pub nombre_centro: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(rename = "fechaISO")]
    pub fecha_iso: Option<String>,
}

/// Datos de una selección antes de asignarle identificador de sesión.
#[derive(Debug, Clone, PartialEq)]
pub struct DatosSeleccion {
    pub provincia: String,
    pub zona: String,
    pub municipio: String,
    pub tipo: TipoCentro,
    pub seleccion: String,
    pub nombre_centro: String,
    pub fecha_iso: String,
}

#[derive(Clone)]
pub struct ContextoSesion {
    kv: Arc<dyn AlmacenClaveValor>,
    /// Serializa las lecturas-modificaciones de la plantilla.
    plantilla: Arc<Mutex<()>>,
}

impl ContextoSesion {
    pub fn new(kv: Arc<dyn AlmacenClaveValor>) -> Self {
        ContextoSesion { kv, plantilla: Arc::new(Mutex::new(())) }
    }

    pub fn en_memoria() -> Self {
        ContextoSesion::new(Arc::new(KvMemoria::new()))
    }

    fn leer_json<T: DeserializeOwned>(&self, clave: &str) -> Resultado<Option<T>> {
        let Some(texto) = self.kv.get(clave)? else {
            return Ok(None);
        };
        match serde_json::from_str::<T>(&texto) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(clave, error = %e, "JSON local corrupto, se ignora");
                Ok(None)
            }
        }
    }

    fn escribir_json<T: Serialize + ?Sized>(&self, clave: &str, valor: &T) -> Resultado<()> {
        let texto = serde_json::to_string(valor)?;
        self.kv.set(clave, &texto)
    }

    // --- selección ---

    pub fn seleccion_actual(&self) -> Resultado<Option<SeleccionActual>> {
        self.leer_json(CLAVE_SELECCION)
    }

    /// Sustituye la selección guardada conservando el identificador de sesión
    /// que ya existiera.
    pub fn guardar_seleccion(&self, datos: DatosSeleccion) -> Resultado<SeleccionActual> {
        let session_key = match self.seleccion_actual()? {
            Some(previa) if !previa.session_key.is_empty() => previa.session_key,
            _ => {
                let nueva = Uuid::new_v4().to_string();
                info!(session_key = %nueva, "nueva sesión");
                nueva
            }
        };
        let actual = SeleccionActual {
            session_key,
            provincia: Some(datos.provincia),
            zona: Some(datos.zona),
            municipio: Some(datos.municipio),
            tipo: datos.tipo,
            seleccion: datos.seleccion,
            nombre_centro: Some(datos.nombre_centro),
            fecha_iso: Some(datos.fecha_iso),
        };
        self.escribir_json(CLAVE_SELECCION, &actual)?;
        Ok(actual)
    }

    pub fn limpiar_seleccion(&self) -> Resultado<()> {
        self.kv.remove(CLAVE_SELECCION)
    }

    // --- plantilla de componentes ---

    /// Lee la plantilla. Si sólo existe bajo una clave antigua se migra una
    /// vez a la clave canónica.
    pub fn componentes(&self) -> Resultado<Vec<Componente>> {
        if let Some(lista) = self.leer_json::<Vec<Componente>>(CLAVE_COMPONENTES)? {
            return Ok(lista);
        }
        for legada in CLAVES_COMPONENTES_LEGADAS {
            if let Some(lista) = self.leer_json::<Vec<Componente>>(legada)? {
                info!(desde = legada, n = lista.len(), "migrando plantilla a la clave canónica");
                self.guardar_componentes(&lista)?;
                self.limpiar_componentes_legados()?;
                return Ok(lista);
            }
        }
        Ok(Vec::new())
    }

    pub fn guardar_componentes(&self, lista: &[Componente]) -> Resultado<()> {
        self.escribir_json(CLAVE_COMPONENTES, lista)
    }

    /// Lee la plantilla, aplica `cambio` y la guarda, sin que otra
    /// modificación se intercale entre la lectura y la escritura.
    pub fn modificar_componentes<R>(
        &self,
        cambio: impl FnOnce(&mut Vec<Componente>) -> Resultado<R>,
    ) -> Resultado<R> {
        let _cerrojo = self.plantilla.lock().unwrap_or_else(|e| e.into_inner());
        let mut lista = self.componentes()?;
        let r = cambio(&mut lista)?;
        self.guardar_componentes(&lista)?;
        Ok(r)
    }

    pub fn limpiar_componentes_legados(&self) -> Resultado<()> {
        for legada in CLAVES_COMPONENTES_LEGADAS {
            self.kv.remove(legada)?;
        }
        debug!("claves antiguas de plantilla eliminadas");
        Ok(())
    }

    // --- copias locales ---

    pub fn parte_local(&self, pk: &str) -> Resultado<Option<ParteDiario>> {
        self.leer_json(&clave_parte(pk))
    }

    pub fn guardar_parte_local(&self, pk: &str, parte: &ParteDiario) -> Resultado<()> {
        self.escribir_json(&clave_parte(pk), parte)
    }

    pub fn incendios_local(&self, pk: Option<&str>) -> Resultado<Vec<Salida>> {
        Ok(self.leer_json(&clave_incendios(pk))?.unwrap_or_default())
    }

    pub fn guardar_incendios_local(&self, pk: Option<&str>, salidas: &[Salida]) -> Resultado<()> {
        self.escribir_json(&clave_incendios(pk), salidas)
    }

    pub fn cuadrante(&self, anio: i32, mes: u32, centro: &str) -> Resultado<Option<CuadranteMensual>> {
        self.leer_json(&clave_cuadrante(anio, mes, centro))
    }

    pub fn guardar_cuadrante(&self, centro: &str, cuadrante: &CuadranteMensual) -> Resultado<()> {
        self.escribir_json(&clave_cuadrante(cuadrante.anio, cuadrante.mes, centro), cuadrante)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datos(municipio: &str) -> DatosSeleccion {
        DatosSeleccion {
            provincia: "Cáceres".into(),
            zona: "Zona Norte".into(),
            municipio: municipio.into(),
            tipo: TipoCentro::Unidad,
            seleccion: "Unidad de Plasencia".into(),
            nombre_centro: municipio.into(),
            fecha_iso: "2025-08-01".into(),
        }
    }

    #[test]
    fn reutiliza_session_key() {
        let ctx = ContextoSesion::en_memoria();
        let a = ctx.guardar_seleccion(datos("Plasencia")).unwrap();
        let b = ctx.guardar_seleccion(datos("Coria")).unwrap();
        assert!(!a.session_key.is_empty());
        assert_eq!(a.session_key, b.session_key);
        assert_eq!(ctx.seleccion_actual().unwrap().unwrap().municipio.as_deref(), Some("Coria"));
    }

    #[test]
    fn json_corrupto_es_ausencia() {
        let kv = Arc::new(KvMemoria::new());
        kv.set(CLAVE_SELECCION, "{no es json").unwrap();
        kv.set(CLAVE_COMPONENTES, "[1,2").unwrap();
        let ctx = ContextoSesion::new(kv);
        assert!(ctx.seleccion_actual().unwrap().is_none());
        assert!(ctx.componentes().unwrap().is_empty());
        // y se puede volver a escribir encima
        let s = ctx.guardar_seleccion(datos("Plasencia")).unwrap();
        assert!(!s.session_key.is_empty());
    }

    #[test]
    fn formato_json_de_la_seleccion() {
        let ctx = ContextoSesion::en_memoria();
        let s = ctx.guardar_seleccion(datos("Plasencia")).unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["tipo"], "unidad");
        assert_eq!(v["fechaISO"], "2025-08-01");
        assert_eq!(v["nombreCentro"], "Plasencia");
        assert!(v["sessionKey"].is_string());
    }

    #[test]
    fn migra_plantilla_legada_una_vez() {
        let kv = Arc::new(KvMemoria::new());
        kv.set(
            "infoex:componentes",
            r#"[{"id":"c1","nombre":"Luis","apellidos":"García Pérez"}]"#,
        )
        .unwrap();
        let ctx = ContextoSesion::new(kv.clone());
        let lista = ctx.componentes().unwrap();
        assert_eq!(lista.len(), 1);
        assert!(kv.get("infoex:componentes").unwrap().is_none());
        assert!(kv.get(CLAVE_COMPONENTES).unwrap().is_some());
    }

    #[test]
    fn la_clave_canonica_tiene_prioridad() {
        let kv = Arc::new(KvMemoria::new());
        kv.set(CLAVE_COMPONENTES, r#"[{"id":"a","nombre":"Ana","apellidos":"Navas"}]"#).unwrap();
        kv.set("cuadernilo:componentes", r#"[{"id":"b","nombre":"Otro","apellidos":"X"}]"#).unwrap();
        let ctx = ContextoSesion::new(kv);
        let lista = ctx.componentes().unwrap();
        assert_eq!(lista[0].id, "a");
    }

    #[test]
    fn incendios_sin_parte_usan_clave_temporal() {
        let ctx = ContextoSesion::en_memoria();
        assert!(ctx.incendios_local(None).unwrap().is_empty());
        let s = Salida::nueva();
        ctx.guardar_incendios_local(None, std::slice::from_ref(&s)).unwrap();
        assert_eq!(ctx.incendios_local(None).unwrap(), vec![s]);
        assert!(ctx.incendios_local(Some("2025-08-01:unidad:X")).unwrap().is_empty());
    }
}
