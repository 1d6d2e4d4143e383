//! Almacén de filas remoto: operaciones CRUD opacas sobre tablas con nombre.
//!
//! El resto del crate sólo conoce el trait `AlmacenFilas`. Hay dos
//! implementaciones con el mismo esquema (`cuadernillo`, `partes`,
//! `parte_filas` e `incendios`): `SqliteFilas` sobre un fichero y
//! `PostgresFilas` sobre un servidor Postgres.

pub mod esquema;
pub mod pg;
pub mod sqlite;

pub use pg::PostgresFilas;
pub use sqlite::SqliteFilas;

use crate::error::Resultado;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Una fila: columna -> valor JSON.
pub type Fila = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Condicion {
    /// `columna = valor` (`IS NULL` si el valor es `null`)
    Igual(String, Value),
    /// `desde <= columna <= hasta`
    Entre(String, Value, Value),
    /// Alguna de las columnas contiene el texto (sin distinguir mayúsculas).
    ContieneAlguna(Vec<String>, String),
}

/// Conjunción de condiciones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filtro {
    pub condiciones: Vec<Condicion>,
}

impl Filtro {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn igual(mut self, columna: &str, valor: impl Into<Value>) -> Self {
        self.condiciones.push(Condicion::Igual(columna.to_string(), valor.into()));
        self
    }

    pub fn entre(mut self, columna: &str, desde: impl Into<Value>, hasta: impl Into<Value>) -> Self {
        self.condiciones
            .push(Condicion::Entre(columna.to_string(), desde.into(), hasta.into()));
        self
    }

    pub fn contiene_alguna(mut self, columnas: &[&str], texto: &str) -> Self {
        self.condiciones.push(Condicion::ContieneAlguna(
            columnas.iter().map(|c| c.to_string()).collect(),
            texto.to_string(),
        ));
        self
    }

    pub fn es_vacio(&self) -> bool {
        self.condiciones.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Orden {
    pub columna: String,
    pub ascendente: bool,
    pub nulos_primero: bool,
}

impl Orden {
    pub fn asc(columna: &str) -> Self {
        Orden { columna: columna.to_string(), ascendente: true, nulos_primero: true }
    }

    pub fn desc(columna: &str) -> Self {
        Orden { columna: columna.to_string(), ascendente: false, nulos_primero: false }
    }
}

/// Rango de filas, ambos extremos incluidos (`desde..=hasta`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rango {
    pub desde: usize,
    pub hasta: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consulta {
    pub filtro: Filtro,
    pub orden: Vec<Orden>,
    pub rango: Option<Rango>,
}

impl Consulta {
    pub fn new(filtro: Filtro) -> Self {
        Consulta { filtro, ..Default::default() }
    }

    pub fn ordenar(mut self, orden: Orden) -> Self {
        self.orden.push(orden);
        self
    }

    pub fn rango(mut self, desde: usize, hasta: usize) -> Self {
        self.rango = Some(Rango { desde, hasta });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seleccionadas {
    pub filas: Vec<Fila>,
    /// Total de filas que cumplen el filtro, sin aplicar el rango.
    pub total: usize,
}

pub trait AlmacenFilas: Send + Sync {
    fn insert(&self, tabla: &str, filas: &[Fila]) -> Resultado<()>;
    fn select(&self, tabla: &str, consulta: &Consulta) -> Resultado<Seleccionadas>;
    fn upsert(&self, tabla: &str, fila: &Fila, clave_conflicto: &str) -> Resultado<()>;
    /// Devuelve cuántas filas se borraron.
    fn delete(&self, tabla: &str, filtro: &Filtro) -> Resultado<usize>;
}

/// Convierte un registro serializable en una fila, quitando los `null`
/// para que la tabla aplique sus valores por defecto.
pub fn a_fila<T: serde::Serialize>(registro: &T) -> Resultado<Fila> {
    match serde_json::to_value(registro)? {
        Value::Object(mut m) => {
            m.retain(|_, v| !v.is_null());
            Ok(m)
        }
        otro => Err(crate::error::CuadernilloError::validacion(format!(
            "se esperaba un objeto para una fila, llegó {}",
            otro
        ))),
    }
}

/// SQLite guarda los booleanos como 0/1; acepta ambos formatos.
pub fn bool_flexible<'de, D>(d: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_f64().map(|x| x != 0.0).unwrap_or(false)),
        _ => None,
    })
}

/// Lee una columna como texto, `""` si falta o es `null`.
pub fn texto(fila: &Fila, columna: &str) -> String {
    match fila.get(columna) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(otro) => otro.to_string(),
    }
}

/// `None` para cadenas vacías.
pub fn no_vacio(s: &str) -> Value {
    if s.is_empty() { Value::Null } else { Value::String(s.to_string()) }
}
