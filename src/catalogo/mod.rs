//! Catálogo estático de ubicaciones: provincia → zona → municipios, unidades
//! y casetas por municipio.
//!
//! Se carga una sola vez al arrancar y se valida en ese momento; el resto del
//! crate trabaja con referencias tipadas y no vuelve a comprobar nulos.
//!
//! Formato JSON:
//! ```json
//! {
//!   "Cáceres": {
//!     "Zona Norte": {
//!       "municipios": ["Plasencia", "Coria"],
//!       "unidades": ["Unidad de Plasencia"],
//!       "alias": ["Norte"],
//!       "casetas": { "Plasencia": ["Caseta Valcorchero"] }
//!     }
//!   }
//! }
//! ```

mod normalizar;

pub use normalizar::{contiene_normalizado, normalizar, plegar};

use crate::error::{CuadernilloError, Resultado};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// Catálogo empaquetado con el binario.
pub const CATALOGO_EMPAQUETADO: &str = include_str!("../../datos/catalogo.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Zona {
    pub municipios: Vec<String>,
    pub unidades: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<Vec<String>>,
    /// Casetas indexadas por el nombre exacto del municipio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casetas: Option<BTreeMap<String, Vec<String>>>,
}

impl Zona {
    pub fn casetas_de(&self, municipio: &str) -> &[String] {
        self.casetas
            .as_ref()
            .and_then(|c| c.get(municipio))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Catalogo {
    provincias: BTreeMap<String, BTreeMap<String, Zona>>,
}

impl Catalogo {
    /// Parsea y valida un catálogo en JSON.
    pub fn desde_json(texto: &str) -> Resultado<Catalogo> {
        let catalogo: Catalogo = serde_json::from_str(texto)
            .map_err(|e| CuadernilloError::CatalogoInvalido(format!("JSON mal formado: {}", e)))?;
        catalogo.validar()?;
        Ok(catalogo)
    }

    pub fn desde_archivo(ruta: &Path) -> Resultado<Catalogo> {
        let texto = std::fs::read_to_string(ruta)?;
        let catalogo = Catalogo::desde_json(&texto)?;
        info!(ruta = %ruta.display(), provincias = catalogo.provincias.len(), "catálogo cargado");
        Ok(catalogo)
    }

    pub fn empaquetado() -> Resultado<Catalogo> {
        Catalogo::desde_json(CATALOGO_EMPAQUETADO)
    }

    /// Usa `ruta` si se indica, si no el catálogo empaquetado.
    pub fn cargar(ruta: Option<&Path>) -> Resultado<Catalogo> {
        match ruta {
            Some(r) => Catalogo::desde_archivo(r),
            None => Catalogo::empaquetado(),
        }
    }

    fn validar(&self) -> Resultado<()> {
        let invalido = |msg: String| Err(CuadernilloError::CatalogoInvalido(msg));

        if self.provincias.is_empty() {
            return invalido("el catálogo no tiene provincias".into());
        }
        for (provincia, zonas) in &self.provincias {
            if provincia.trim().is_empty() {
                return invalido("provincia con nombre vacío".into());
            }
            if zonas.is_empty() {
                return invalido(format!("la provincia '{}' no tiene zonas", provincia));
            }
            for (nombre_zona, zona) in zonas {
                if nombre_zona.trim().is_empty() {
                    return invalido(format!("zona con nombre vacío en '{}'", provincia));
                }
                if zona.municipios.is_empty() {
                    return invalido(format!("la zona '{}' de '{}' no tiene municipios", nombre_zona, provincia));
                }
                let mut vistos = HashSet::new();
                for m in &zona.municipios {
                    if m.trim().is_empty() {
                        return invalido(format!("municipio vacío en la zona '{}'", nombre_zona));
                    }
                    if !vistos.insert(m.as_str()) {
                        return invalido(format!("municipio '{}' repetido en la zona '{}'", m, nombre_zona));
                    }
                }
                if zona.unidades.iter().any(|u| u.trim().is_empty()) {
                    return invalido(format!("unidad vacía en la zona '{}'", nombre_zona));
                }
                if let Some(casetas) = &zona.casetas {
                    for (municipio, lista) in casetas {
                        if municipio.trim().is_empty() || lista.iter().any(|c| c.trim().is_empty()) {
                            return invalido(format!("caseta vacía en la zona '{}'", nombre_zona));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn provincias(&self) -> Vec<&str> {
        self.provincias.keys().map(String::as_str).collect()
    }

    /// Zonas de una provincia; vacío si la provincia no existe.
    pub fn zonas(&self, provincia: &str) -> Vec<&str> {
        self.provincias
            .get(provincia)
            .map(|z| z.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn zona(&self, provincia: &str, zona: &str) -> Option<&Zona> {
        self.provincias.get(provincia)?.get(zona)
    }

    pub fn municipios(&self, provincia: &str, zona: &str) -> &[String] {
        self.zona(provincia, zona).map(|z| z.municipios.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogo_empaquetado_es_valido() {
        let c = Catalogo::empaquetado().expect("el catálogo empaquetado debe validar");
        assert!(c.provincias().contains(&"Cáceres"));
        assert!(c.zonas("Cáceres").contains(&"Zona Norte"));
        assert!(c.municipios("Cáceres", "Zona Norte").iter().any(|m| m == "Plasencia"));
    }

    #[test]
    fn claves_desconocidas_dan_listas_vacias() {
        let c = Catalogo::empaquetado().unwrap();
        assert!(c.zonas("Atlántida").is_empty());
        assert!(c.municipios("Cáceres", "Zona Inexistente").is_empty());
        assert!(c.zona("Cáceres", "").is_none());
    }

    #[test]
    fn rechaza_zona_sin_municipios() {
        let json = r#"{"Badajoz": {"Zona Sur": {"municipios": [], "unidades": []}}}"#;
        assert!(matches!(Catalogo::desde_json(json), Err(CuadernilloError::CatalogoInvalido(_))));
    }

    #[test]
    fn rechaza_campos_desconocidos() {
        let json = r#"{"Badajoz": {"Zona Sur": {"municipios": ["Zafra"], "unidades": [], "casetass": {}}}}"#;
        assert!(Catalogo::desde_json(json).is_err());
    }

    #[test]
    fn rechaza_municipio_repetido() {
        let json = r#"{"Badajoz": {"Zona Sur": {"municipios": ["Zafra", "Zafra"], "unidades": []}}}"#;
        assert!(Catalogo::desde_json(json).is_err());
    }

    #[test]
    fn campos_opcionales() {
        let json = r#"{"Badajoz": {"Zona Sur": {"municipios": ["Zafra"], "unidades": ["Unidad de Zafra"]}}}"#;
        let c = Catalogo::desde_json(json).unwrap();
        let z = c.zona("Badajoz", "Zona Sur").unwrap();
        assert!(z.alias.is_none());
        assert!(z.casetas_de("Zafra").is_empty());
    }
}
