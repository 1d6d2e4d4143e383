use crate::error::{CuadernilloError, Resultado};
use crate::sesion::ContextoSesion;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Miembro de la plantilla de una unidad o caseta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Componente {
    pub id: String,
    pub nombre: String,
    pub apellidos: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero: Option<String>,
}

impl Componente {
    /// Nombre y apellidos son obligatorios; el número vacío se descarta.
    pub fn nuevo(nombre: &str, apellidos: &str, numero: Option<&str>) -> Resultado<Componente> {
        let nombre = nombre.trim();
        let apellidos = apellidos.trim();
        if nombre.is_empty() || apellidos.is_empty() {
            return Err(CuadernilloError::validacion("nombre y apellidos son obligatorios"));
        }
        Ok(Componente {
            id: Uuid::new_v4().to_string(),
            nombre: nombre.to_string(),
            apellidos: apellidos.to_string(),
            numero: numero.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        })
    }

    /// `"Apellidos, Nombre"`
    pub fn etiqueta(&self) -> String {
        format!("{}, {}", self.apellidos, self.nombre)
    }
}

/// Crea un componente y lo añade al final de la plantilla.
pub fn crear(ctx: &ContextoSesion, nombre: &str, apellidos: &str, numero: Option<&str>) -> Resultado<Componente> {
    let nuevo = Componente::nuevo(nombre, apellidos, numero)?;
    let total = ctx.modificar_componentes(|lista| {
        lista.push(nuevo.clone());
        Ok(lista.len())
    })?;
    info!(id = %nuevo.id, total, "componente añadido");
    Ok(nuevo)
}

/// Quita un componente; `false` si no existía.
pub fn eliminar(ctx: &ContextoSesion, id: &str) -> Resultado<bool> {
    ctx.modificar_componentes(|lista| {
        let antes = lista.len();
        lista.retain(|c| c.id != id);
        Ok(lista.len() != antes)
    })
}

/// Filtra por `"apellidos nombre"` sin distinguir mayúsculas.
pub fn filtrar<'a>(lista: &'a [Componente], consulta: &str) -> Vec<&'a Componente> {
    let q = consulta.trim().to_lowercase();
    lista
        .iter()
        .filter(|c| q.is_empty() || format!("{} {}", c.apellidos, c.nombre).to_lowercase().contains(&q))
        .collect()
}
