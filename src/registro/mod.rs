//! Registros del cuadernillo: plantilla, parte diario, incendios,
//! cuadrante mensual, resúmenes y filas planas para administración.

pub mod componentes;
pub mod cuadernillo;
pub mod cuadrante;
pub mod incendios;
pub mod parte;
pub mod resumen;
