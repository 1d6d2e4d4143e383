pub mod admin;
pub mod catalogo;
pub mod componentes;
pub mod control_diario;
pub mod cuadernillo;
pub mod docs;
pub mod incendios;
pub mod resumen;
pub mod seleccion;

pub use admin::*;
pub use catalogo::*;
pub use componentes::*;
pub use control_diario::*;
pub use cuadernillo::*;
pub use docs::*;
pub use incendios::*;
pub use resumen::*;
pub use seleccion::*;
