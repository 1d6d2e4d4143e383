//! Salidas a incendios vinculadas a un parte diario.

use crate::almacen::{no_vacio, texto, AlmacenFilas, Consulta, Fila, Filtro, Orden};
use crate::error::{CuadernilloError, Resultado};
use crate::registro::parte::validar_hora;
use crate::sesion::ContextoSesion;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Salida {
    pub id: String,
    #[serde(default)]
    pub termino_municipal: String,
    #[serde(default)]
    pub h_movilizacion: String,
    #[serde(default)]
    pub h_salida: String,
    #[serde(default)]
    pub h_llegada_inc: String,
    #[serde(default)]
    pub h_regreso: String,
    #[serde(default)]
    pub h_llegada_base: String,
    #[serde(default)]
    pub num_componentes: Option<u32>,
}

impl Salida {
    pub fn nueva() -> Self {
        Salida { id: Uuid::new_v4().to_string(), ..Default::default() }
    }

    pub fn validar(&self) -> Resultado<()> {
        for h in [&self.h_movilizacion, &self.h_salida, &self.h_llegada_inc, &self.h_regreso, &self.h_llegada_base] {
            validar_hora(h)?;
        }
        Ok(())
    }

    fn a_fila(&self, parte_pk: &str) -> Fila {
        let v = json!({
            "parte_pk": parte_pk,
            "termino_municipal": no_vacio(&self.termino_municipal),
            "h_movilizacion": no_vacio(&self.h_movilizacion),
            "h_salida": no_vacio(&self.h_salida),
            "h_llegada_inc": no_vacio(&self.h_llegada_inc),
            "h_regreso": no_vacio(&self.h_regreso),
            "h_llegada_base": no_vacio(&self.h_llegada_base),
            "num_componentes": self.num_componentes,
        });
        let mut fila = match v {
            Value::Object(m) => m,
            _ => Fila::new(),
        };
        if !self.id.is_empty() {
            fila.insert("id".to_string(), Value::String(self.id.clone()));
        }
        fila
    }

    fn desde_fila(f: &Fila) -> Salida {
        Salida {
            id: texto(f, "id"),
            termino_municipal: texto(f, "termino_municipal"),
            h_movilizacion: texto(f, "h_movilizacion"),
            h_salida: texto(f, "h_salida"),
            h_llegada_inc: texto(f, "h_llegada_inc"),
            h_regreso: texto(f, "h_regreso"),
            h_llegada_base: texto(f, "h_llegada_base"),
            num_componentes: f.get("num_componentes").and_then(Value::as_u64).map(|n| n as u32),
        }
    }
}

pub fn listar(ctx: &ContextoSesion, parte_pk: Option<&str>) -> Resultado<Vec<Salida>> {
    ctx.incendios_local(parte_pk)
}

/// Añade una salida vacía al final.
pub fn anadir(ctx: &ContextoSesion, parte_pk: Option<&str>) -> Resultado<Salida> {
    let mut salidas = ctx.incendios_local(parte_pk)?;
    let nueva = Salida::nueva();
    salidas.push(nueva.clone());
    ctx.guardar_incendios_local(parte_pk, &salidas)?;
    Ok(nueva)
}

/// Sustituye la salida con el mismo id; `false` si no existe.
pub fn actualizar(ctx: &ContextoSesion, parte_pk: Option<&str>, salida: Salida) -> Resultado<bool> {
    salida.validar()?;
    let mut salidas = ctx.incendios_local(parte_pk)?;
    let Some(hueco) = salidas.iter_mut().find(|s| s.id == salida.id) else {
        return Ok(false);
    };
    *hueco = salida;
    ctx.guardar_incendios_local(parte_pk, &salidas)?;
    Ok(true)
}

pub fn eliminar(ctx: &ContextoSesion, parte_pk: Option<&str>, id: &str) -> Resultado<bool> {
    let mut salidas = ctx.incendios_local(parte_pk)?;
    let antes = salidas.len();
    salidas.retain(|s| s.id != id);
    if salidas.len() == antes {
        return Ok(false);
    }
    ctx.guardar_incendios_local(parte_pk, &salidas)?;
    Ok(true)
}

/// Sustituye en el backend todas las salidas del parte (borrar + insertar).
pub fn guardar_remoto(almacen: Option<&dyn AlmacenFilas>, parte_pk: Option<&str>, salidas: &[Salida]) -> Resultado<()> {
    let almacen = almacen.ok_or(CuadernilloError::SinBackend)?;
    let pk = parte_pk.filter(|p| !p.is_empty()).ok_or_else(|| {
        CuadernilloError::validacion("no hay parte vinculado: vuelve desde el control diario")
    })?;
    for s in salidas {
        s.validar()?;
    }
    almacen.delete("incendios", &Filtro::new().igual("parte_pk", pk))?;
    if !salidas.is_empty() {
        let filas: Vec<Fila> = salidas.iter().map(|s| s.a_fila(pk)).collect();
        almacen.insert("incendios", &filas)?;
    }
    info!(parte_pk = pk, n = salidas.len(), "salidas a incendios guardadas");
    Ok(())
}

pub fn cargar_remoto(almacen: &dyn AlmacenFilas, parte_pk: &str) -> Resultado<Vec<Salida>> {
    let r = almacen.select(
        "incendios",
        &Consulta::new(Filtro::new().igual("parte_pk", parte_pk)).ordenar(Orden::asc("created_at")),
    )?;
    Ok(r.filas.iter().map(Salida::desde_fila).collect())
}

/// Copia local y, con backend y parte, la remota si trae salidas. Lo leído
/// del backend se guarda también en local.
pub fn cargar(ctx: &ContextoSesion, almacen: Option<&dyn AlmacenFilas>, parte_pk: Option<&str>) -> Resultado<Vec<Salida>> {
    let locales = ctx.incendios_local(parte_pk)?;
    let (Some(almacen), Some(pk)) = (almacen, parte_pk.filter(|p| !p.is_empty())) else {
        return Ok(locales);
    };
    match cargar_remoto(almacen, pk) {
        Ok(remotas) if !remotas.is_empty() => {
            ctx.guardar_incendios_local(parte_pk, &remotas)?;
            Ok(remotas)
        }
        Ok(_) => Ok(locales),
        Err(e) => {
            warn!(parte_pk = pk, error = %e, "no se pudieron leer las salidas remotas");
            Ok(locales)
        }
    }
}
