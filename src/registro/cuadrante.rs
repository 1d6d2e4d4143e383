//! Cuadrante mensual: un código por componente y día del mes.

use crate::error::{CuadernilloError, Resultado};
use crate::registro::componentes::{filtrar, Componente};
use crate::sesion::ContextoSesion;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CodigoCuadrante {
    T,
    L,
    V,
    P,
    B,
    HX,
}

impl CodigoCuadrante {
    pub const TODOS: [CodigoCuadrante; 6] = [
        CodigoCuadrante::T,
        CodigoCuadrante::L,
        CodigoCuadrante::V,
        CodigoCuadrante::P,
        CodigoCuadrante::B,
        CodigoCuadrante::HX,
    ];

    pub fn como_str(&self) -> &'static str {
        match self {
            CodigoCuadrante::T => "T",
            CodigoCuadrante::L => "L",
            CodigoCuadrante::V => "V",
            CodigoCuadrante::P => "P",
            CodigoCuadrante::B => "B",
            CodigoCuadrante::HX => "HX",
        }
    }

    pub fn etiqueta(&self) -> &'static str {
        match self {
            CodigoCuadrante::T => "Trabajo / Guardia",
            CodigoCuadrante::L => "Libre",
            CodigoCuadrante::V => "Vacaciones",
            CodigoCuadrante::P => "Permiso",
            CodigoCuadrante::B => "Baja",
            CodigoCuadrante::HX => "Horas extra",
        }
    }
}

impl fmt::Display for CodigoCuadrante {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.como_str())
    }
}

impl FromStr for CodigoCuadrante {
    type Err = CuadernilloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CodigoCuadrante::TODOS
            .into_iter()
            .find(|c| c.como_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CuadernilloError::validacion(format!("código de cuadrante desconocido: '{}'", s)))
    }
}

/// Días del mes; `None` si el mes no existe.
pub fn dias_del_mes(anio: i32, mes: u32) -> Option<u32> {
    let primero = NaiveDate::from_ymd_opt(anio, mes, 1)?;
    let siguiente = if mes == 12 {
        NaiveDate::from_ymd_opt(anio + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(anio, mes + 1, 1)?
    };
    Some(siguiente.signed_duration_since(primero).num_days() as u32)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuadranteMensual {
    pub anio: i32,
    pub mes: u32,
    /// componente -> día -> código
    #[serde(default)]
    pub celdas: BTreeMap<String, BTreeMap<u32, CodigoCuadrante>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilaCuadrante {
    pub componente_id: String,
    pub apellidos: String,
    pub nombre: String,
    /// Índice 0 = día 1.
    pub dias: Vec<Option<CodigoCuadrante>>,
}

impl CuadranteMensual {
    pub fn nuevo(anio: i32, mes: u32) -> Resultado<Self> {
        if dias_del_mes(anio, mes).is_none() {
            return Err(CuadernilloError::validacion(format!("mes inválido: {}-{}", anio, mes)));
        }
        Ok(CuadranteMensual { anio, mes, celdas: BTreeMap::new() })
    }

    pub fn de_fecha(fecha: NaiveDate) -> Self {
        CuadranteMensual { anio: fecha.year(), mes: fecha.month(), celdas: BTreeMap::new() }
    }

    pub fn dias(&self) -> u32 {
        dias_del_mes(self.anio, self.mes).unwrap_or(0)
    }

    /// Fija o borra (`None`) el código de un día.
    pub fn asignar(&mut self, componente_id: &str, dia: u32, codigo: Option<CodigoCuadrante>) -> Resultado<()> {
        if dia == 0 || dia > self.dias() {
            return Err(CuadernilloError::validacion(format!(
                "el día {} no existe en {:04}-{:02}",
                dia, self.anio, self.mes
            )));
        }
        match codigo {
            Some(c) => {
                self.celdas.entry(componente_id.to_string()).or_default().insert(dia, c);
            }
            None => {
                if let Some(dias) = self.celdas.get_mut(componente_id) {
                    dias.remove(&dia);
                    if dias.is_empty() {
                        self.celdas.remove(componente_id);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn codigo(&self, componente_id: &str, dia: u32) -> Option<CodigoCuadrante> {
        self.celdas.get(componente_id).and_then(|d| d.get(&dia)).copied()
    }

    pub fn totales(&self, componente_id: &str) -> BTreeMap<CodigoCuadrante, u32> {
        let mut t = BTreeMap::new();
        for c in self.celdas.get(componente_id).into_iter().flat_map(|d| d.values()) {
            *t.entry(*c).or_insert(0) += 1;
        }
        t
    }

    /// Filas de la rejilla para los componentes que pasan el filtro.
    pub fn filas(&self, componentes: &[Componente], consulta: &str) -> Vec<FilaCuadrante> {
        let dias = self.dias();
        filtrar(componentes, consulta)
            .into_iter()
            .map(|c| FilaCuadrante {
                componente_id: c.id.clone(),
                apellidos: c.apellidos.clone(),
                nombre: c.nombre.clone(),
                dias: (1..=dias).map(|d| self.codigo(&c.id, d)).collect(),
            })
            .collect()
    }
}

/// Cuadrante guardado para el centro, o uno vacío.
pub fn cargar(ctx: &ContextoSesion, anio: i32, mes: u32, centro: &str) -> Resultado<CuadranteMensual> {
    match ctx.cuadrante(anio, mes, centro)? {
        Some(c) => Ok(c),
        None => CuadranteMensual::nuevo(anio, mes),
    }
}

pub fn asignar_celda(
    ctx: &ContextoSesion,
    centro: &str,
    anio: i32,
    mes: u32,
    componente_id: &str,
    dia: u32,
    codigo: Option<CodigoCuadrante>,
) -> Resultado<CuadranteMensual> {
    let mut cuadrante = cargar(ctx, anio, mes, centro)?;
    cuadrante.asignar(componente_id, dia, codigo)?;
    ctx.guardar_cuadrante(centro, &cuadrante)?;
    Ok(cuadrante)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dias_por_mes() {
        assert_eq!(dias_del_mes(2025, 2), Some(28));
        assert_eq!(dias_del_mes(2024, 2), Some(29));
        assert_eq!(dias_del_mes(2025, 12), Some(31));
        assert_eq!(dias_del_mes(2025, 4), Some(30));
        assert_eq!(dias_del_mes(2025, 13), None);
    }

    #[test]
    fn no_acepta_dias_fuera_del_mes() {
        let mut c = CuadranteMensual::nuevo(2025, 2).unwrap();
        assert!(c.asignar("a", 29, Some(CodigoCuadrante::T)).is_err());
        assert!(c.asignar("a", 0, Some(CodigoCuadrante::T)).is_err());
        c.asignar("a", 28, Some(CodigoCuadrante::L)).unwrap();
        assert_eq!(c.codigo("a", 28), Some(CodigoCuadrante::L));
        c.asignar("a", 28, None).unwrap();
        assert!(c.celdas.is_empty());
        assert!(CuadranteMensual::nuevo(2025, 0).is_err());
    }

    #[test]
    fn codigos_con_etiqueta() {
        assert_eq!("hx".parse::<CodigoCuadrante>().unwrap(), CodigoCuadrante::HX);
        assert_eq!(CodigoCuadrante::T.etiqueta(), "Trabajo / Guardia");
        assert!("JR".parse::<CodigoCuadrante>().is_err());
    }

    #[test]
    fn rejilla_filtrada_y_persistida() {
        let ctx = ContextoSesion::en_memoria();
        let a = Componente::nuevo("Luis", "García", None).unwrap();
        let b = Componente::nuevo("María", "Santos", None).unwrap();
        asignar_celda(&ctx, "Unidad de Coria", 2025, 8, &a.id, 3, Some(CodigoCuadrante::T)).unwrap();
        asignar_celda(&ctx, "Unidad de Coria", 2025, 8, &a.id, 4, Some(CodigoCuadrante::T)).unwrap();
        asignar_celda(&ctx, "Unidad de Coria", 2025, 8, &a.id, 5, Some(CodigoCuadrante::V)).unwrap();

        let c = cargar(&ctx, 2025, 8, "Unidad de Coria").unwrap();
        let filas = c.filas(&[a.clone(), b.clone()], "");
        assert_eq!(filas.len(), 2);
        assert_eq!(filas[0].dias.len(), 31);
        assert_eq!(filas[0].dias[2], Some(CodigoCuadrante::T));
        assert!(filas[1].dias.iter().all(Option::is_none));
        assert_eq!(c.filas(&[a.clone(), b], "santos").len(), 1);
        assert_eq!(c.totales(&a.id).get(&CodigoCuadrante::T), Some(&2));

        // otro centro, otro cuadrante
        assert!(cargar(&ctx, 2025, 8, "Caseta Valcorchero").unwrap().celdas.is_empty());
    }
}
