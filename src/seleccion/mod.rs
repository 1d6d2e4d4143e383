//! Selector en cascada: provincia → zona → municipio → tipo → centro.
//!
//! Fijar un nivel borra todos los niveles más profundos. Un nivel sólo admite
//! un valor no vacío si el nivel anterior ya está fijado, así que los únicos
//! estados alcanzables son los que tienen un prefijo completo.

use crate::catalogo::{normalizar, Catalogo, Zona};
use crate::error::{CuadernilloError, Resultado};
use crate::sesion::{ContextoSesion, DatosSeleccion, SeleccionActual};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Discrimina el último selector: unidad o caseta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoCentro {
    Unidad,
    Caseta,
}

impl TipoCentro {
    pub fn como_str(&self) -> &'static str {
        match self {
            TipoCentro::Unidad => "unidad",
            TipoCentro::Caseta => "caseta",
        }
    }
}

impl fmt::Display for TipoCentro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.como_str())
    }
}

impl FromStr for TipoCentro {
    type Err = CuadernilloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unidad" => Ok(TipoCentro::Unidad),
            "caseta" => Ok(TipoCentro::Caseta),
            otro => Err(CuadernilloError::validacion(format!("tipo de centro desconocido: '{}'", otro))),
        }
    }
}

/// Niveles del selector, de menos a más profundo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nivel {
    Provincia,
    Zona,
    Municipio,
    Tipo,
    Centro,
}

impl Nivel {
    pub fn anterior(self) -> Option<Nivel> {
        match self {
            Nivel::Provincia => None,
            Nivel::Zona => Some(Nivel::Provincia),
            Nivel::Municipio => Some(Nivel::Zona),
            Nivel::Tipo => Some(Nivel::Municipio),
            Nivel::Centro => Some(Nivel::Tipo),
        }
    }
}

/// Candidatos del último selector.
///
/// - unidad: las unidades de la zona cuyo nombre normalizado contiene el
///   municipio normalizado
/// - caseta: las casetas guardadas bajo el nombre exacto del municipio
/// - sin tipo o sin municipio: ninguno
pub fn calcular_candidatos(tipo: Option<TipoCentro>, municipio: &str, zona: &Zona) -> Vec<String> {
    if municipio.is_empty() {
        return Vec::new();
    }
    match tipo {
        None => Vec::new(),
        Some(TipoCentro::Unidad) => {
            let buscado = normalizar(municipio);
            zona.unidades
                .iter()
                .filter(|u| normalizar(u).contains(&buscado))
                .cloned()
                .collect()
        }
        Some(TipoCentro::Caseta) => zona.casetas_de(municipio).to_vec(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seleccion {
    pub provincia: String,
    pub zona: String,
    pub municipio: String,
    pub tipo: Option<TipoCentro>,
    pub centro: String,
}

impl Seleccion {
    pub fn new() -> Self {
        Self::default()
    }

    fn fijado(&self, nivel: Nivel) -> bool {
        match nivel {
            Nivel::Provincia => !self.provincia.is_empty(),
            Nivel::Zona => !self.zona.is_empty(),
            Nivel::Municipio => !self.municipio.is_empty(),
            Nivel::Tipo => self.tipo.is_some(),
            Nivel::Centro => !self.centro.is_empty(),
        }
    }

    /// Borra todos los niveles más profundos que `nivel`.
    fn limpiar_debajo_de(&mut self, nivel: Nivel) {
        if nivel < Nivel::Zona {
            self.zona.clear();
        }
        if nivel < Nivel::Municipio {
            self.municipio.clear();
        }
        if nivel < Nivel::Tipo {
            self.tipo = None;
        }
        if nivel < Nivel::Centro {
            self.centro.clear();
        }
    }

    fn exigir_anterior(&self, nivel: Nivel, valor_vacio: bool) -> Resultado<()> {
        match nivel.anterior() {
            Some(prev) if !valor_vacio && !self.fijado(prev) => Err(CuadernilloError::validacion(format!(
                "no se puede fijar {:?} sin haber elegido {:?}",
                nivel, prev
            ))),
            _ => Ok(()),
        }
    }

    pub fn set_provincia(&mut self, valor: &str) {
        self.provincia = valor.to_string();
        self.limpiar_debajo_de(Nivel::Provincia);
    }

    pub fn set_zona(&mut self, valor: &str) -> Resultado<()> {
        self.exigir_anterior(Nivel::Zona, valor.is_empty())?;
        self.zona = valor.to_string();
        self.limpiar_debajo_de(Nivel::Zona);
        Ok(())
    }

    pub fn set_municipio(&mut self, valor: &str) -> Resultado<()> {
        self.exigir_anterior(Nivel::Municipio, valor.is_empty())?;
        self.municipio = valor.to_string();
        self.limpiar_debajo_de(Nivel::Municipio);
        Ok(())
    }

    pub fn set_tipo(&mut self, tipo: Option<TipoCentro>) -> Resultado<()> {
        self.exigir_anterior(Nivel::Tipo, tipo.is_none())?;
        self.tipo = tipo;
        self.limpiar_debajo_de(Nivel::Tipo);
        Ok(())
    }

    pub fn set_centro(&mut self, valor: &str) -> Resultado<()> {
        self.exigir_anterior(Nivel::Centro, valor.is_empty())?;
        self.centro = valor.to_string();
        Ok(())
    }

    /// Fija un nivel a partir de texto (cadena vacía = reiniciar).
    pub fn fijar(&mut self, nivel: Nivel, valor: &str) -> Resultado<()> {
        match nivel {
            Nivel::Provincia => {
                self.set_provincia(valor);
                Ok(())
            }
            Nivel::Zona => self.set_zona(valor),
            Nivel::Municipio => self.set_municipio(valor),
            Nivel::Tipo => {
                let tipo = if valor.trim().is_empty() { None } else { Some(valor.parse()?) };
                self.set_tipo(tipo)
            }
            Nivel::Centro => self.set_centro(valor),
        }
    }

    pub fn candidatos(&self, catalogo: &Catalogo) -> Vec<String> {
        match catalogo.zona(&self.provincia, &self.zona) {
            Some(zona) => calcular_candidatos(self.tipo, &self.municipio, zona),
            None => Vec::new(),
        }
    }

    pub fn puede_confirmar(&self) -> bool {
        [Nivel::Provincia, Nivel::Zona, Nivel::Municipio, Nivel::Tipo, Nivel::Centro]
            .into_iter()
            .all(|n| self.fijado(n))
    }

    /// Nombre que se muestra del centro: la caseta si es caseta, si no el municipio.
    pub fn nombre_centro(&self) -> &str {
        match self.tipo {
            Some(TipoCentro::Caseta) => &self.centro,
            _ => &self.municipio,
        }
    }

    /// Guarda la selección en el contexto de sesión y limpia la plantilla
    /// guardada con claves antiguas.
    pub fn confirmar(&self, ctx: &ContextoSesion, fecha: NaiveDate) -> Resultado<SeleccionActual> {
        let Some(tipo) = self.tipo.filter(|_| self.puede_confirmar()) else {
            return Err(CuadernilloError::validacion("la selección está incompleta"));
        };
        let datos = DatosSeleccion {
            provincia: self.provincia.clone(),
            zona: self.zona.clone(),
            municipio: self.municipio.clone(),
            tipo,
            seleccion: self.centro.clone(),
            nombre_centro: self.nombre_centro().to_string(),
            fecha_iso: fecha.format("%Y-%m-%d").to_string(),
        };
        let actual = ctx.guardar_seleccion(datos)?;
        ctx.limpiar_componentes_legados()?;
        debug!(centro = %actual.seleccion, tipo = %actual.tipo, "selección confirmada");
        Ok(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zona_norte() -> Zona {
        Catalogo::empaquetado().unwrap().zona("Cáceres", "Zona Norte").unwrap().clone()
    }

    #[test]
    fn cambiar_provincia_limpia_todo() {
        let mut s = Seleccion {
            provincia: "Cáceres".into(),
            zona: "Zona Norte".into(),
            municipio: "Plasencia".into(),
            tipo: Some(TipoCentro::Unidad),
            centro: "Unidad de Plasencia".into(),
        };
        s.set_provincia("Badajoz");
        assert_eq!(s.provincia, "Badajoz");
        assert!(s.zona.is_empty() && s.municipio.is_empty() && s.tipo.is_none() && s.centro.is_empty());
    }

    #[test]
    fn cambiar_tipo_limpia_solo_el_centro() {
        let mut s = Seleccion {
            provincia: "Cáceres".into(),
            zona: "Zona Norte".into(),
            municipio: "Plasencia".into(),
            tipo: Some(TipoCentro::Unidad),
            centro: "Unidad de Plasencia".into(),
        };
        s.set_tipo(Some(TipoCentro::Caseta)).unwrap();
        assert_eq!(s.municipio, "Plasencia");
        assert!(s.centro.is_empty());
        assert!(!s.puede_confirmar());
    }

    #[test]
    fn no_se_salta_niveles() {
        let mut s = Seleccion::new();
        assert!(s.set_zona("Zona Norte").is_err());
        assert!(s.fijar(Nivel::Centro, "x").is_err());
        // reiniciar un nivel vacío siempre se permite
        assert!(s.set_zona("").is_ok());
        assert_eq!(s, Seleccion::new());
    }

    #[test]
    fn tipo_desconocido() {
        let mut s = Seleccion::new();
        s.set_provincia("Cáceres");
        s.set_zona("Zona Norte").unwrap();
        s.set_municipio("Plasencia").unwrap();
        assert!(s.fijar(Nivel::Tipo, "hangar").is_err());
        assert!(s.fijar(Nivel::Tipo, "caseta").is_ok());
        assert_eq!(s.tipo, Some(TipoCentro::Caseta));
    }

    #[test]
    fn candidatos_unidad_por_contencion_normalizada() {
        let z = zona_norte();
        let c = calcular_candidatos(Some(TipoCentro::Unidad), "Plasencia", &z);
        assert_eq!(c, vec!["Unidad de Plasencia", "Unidad de Plasencia-2"]);
        let c = calcular_candidatos(Some(TipoCentro::Unidad), "Jaraíz de la Vera", &z);
        assert_eq!(c, vec!["Unidad de Jaraíz de La Vera"]);
    }

    #[test]
    fn candidatos_caseta_exactos() {
        let z = zona_norte();
        assert_eq!(
            calcular_candidatos(Some(TipoCentro::Caseta), "Plasencia", &z),
            vec!["Caseta Valcorchero", "Caseta Monfragüe"]
        );
        // sensible a mayúsculas y sin normalizar
        assert!(calcular_candidatos(Some(TipoCentro::Caseta), "plasencia", &z).is_empty());
        assert!(calcular_candidatos(Some(TipoCentro::Caseta), "Hervás", &z).is_empty());
    }

    #[test]
    fn candidatos_vacios_sin_tipo_o_municipio() {
        let z = zona_norte();
        assert!(calcular_candidatos(None, "Plasencia", &z).is_empty());
        assert!(calcular_candidatos(Some(TipoCentro::Unidad), "", &z).is_empty());
    }

    #[test]
    fn nombre_centro_segun_tipo() {
        let mut s = Seleccion {
            provincia: "Cáceres".into(),
            zona: "Zona Norte".into(),
            municipio: "Plasencia".into(),
            tipo: Some(TipoCentro::Caseta),
            centro: "Caseta Valcorchero".into(),
        };
        assert_eq!(s.nombre_centro(), "Caseta Valcorchero");
        s.tipo = Some(TipoCentro::Unidad);
        assert_eq!(s.nombre_centro(), "Plasencia");
    }

    #[test]
    fn confirmar_incompleta_falla() {
        let ctx = ContextoSesion::en_memoria();
        let s = Seleccion::new();
        let hoy = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        assert!(s.confirmar(&ctx, hoy).is_err());
        assert!(ctx.seleccion_actual().unwrap().is_none());
    }
}
